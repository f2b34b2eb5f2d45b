// Table definitions for the normalized product schema.
// Kept in sync with `diesel_runtime::database::SCHEMA_SQL`.

diesel::table! {
    categories (id) {
        id -> Int4,
        name -> Text,
    }
}

diesel::table! {
    customers (id) {
        id -> Text,
    }
}

diesel::table! {
    product_categories (product_id, category_id) {
        product_id -> Text,
        category_id -> Int4,
    }
}

diesel::table! {
    products (id) {
        id -> Text,
        asin -> Nullable<Text>,
        title -> Text,
        product_group -> Text,
        salesrank -> Nullable<Int8>,
    }
}

diesel::table! {
    reviews (id) {
        id -> Int8,
        product_id -> Text,
        customer_id -> Text,
        review_date -> Date,
        rating -> Int2,
        votes -> Int4,
        helpful -> Int4,
    }
}

diesel::table! {
    similar_products (asin, similar_asin) {
        asin -> Text,
        similar_asin -> Text,
    }
}

diesel::joinable!(product_categories -> categories (category_id));
diesel::joinable!(product_categories -> products (product_id));
diesel::joinable!(reviews -> customers (customer_id));
diesel::joinable!(reviews -> products (product_id));

diesel::allow_tables_to_appear_in_same_query!(
    categories,
    customers,
    product_categories,
    products,
    reviews,
    similar_products,
);
