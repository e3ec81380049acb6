// Diesel table definitions, kept in sync with `migrations/`.

diesel::table! {
    orders (id) {
        id -> BigInt,
        remote_id -> Nullable<Text>,
        order_number -> Nullable<Text>,
        channel -> Text,
        sub_channel -> Text,
        channel_reference -> Text,
        status -> Text,
        currency -> Text,
        is_paid -> Bool,
        is_cancelled -> Bool,
        is_processed -> Bool,
        subtotal -> Text,
        shipping_cost -> Text,
        tax -> Text,
        discount -> Text,
        total -> Text,
        received_at -> Nullable<Text>,
        processed_at -> Nullable<Text>,
        paid_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    products (id) {
        id -> BigInt,
        sku -> Text,
        product_code -> Text,
        title -> Text,
        stock_level -> Integer,
        is_placeholder -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    order_items (id) {
        id -> BigInt,
        order_id -> BigInt,
        sku -> Text,
        title -> Text,
        quantity -> BigInt,
        unit_price -> Text,
        cost_price -> Text,
        position -> Integer,
    }
}

diesel::table! {
    order_shipping (id) {
        id -> BigInt,
        order_id -> BigInt,
        carrier -> Text,
        service -> Text,
        tracking_number -> Text,
        postage_cost -> Text,
        weight -> Text,
        shipped_at -> Nullable<Text>,
    }
}

diesel::table! {
    order_notes (id) {
        id -> BigInt,
        order_id -> BigInt,
        body -> Text,
        author -> Text,
        is_internal -> Bool,
        noted_at -> Nullable<Text>,
        position -> Integer,
    }
}

diesel::table! {
    order_properties (id) {
        id -> BigInt,
        order_id -> BigInt,
        name -> Text,
        value -> Text,
        property_type -> Text,
        position -> Integer,
    }
}

diesel::table! {
    order_identifiers (id) {
        id -> BigInt,
        order_id -> BigInt,
        tag -> Text,
        name -> Text,
        position -> Integer,
    }
}

diesel::joinable!(order_items -> orders (order_id));
diesel::joinable!(order_shipping -> orders (order_id));
diesel::joinable!(order_notes -> orders (order_id));
diesel::joinable!(order_properties -> orders (order_id));
diesel::joinable!(order_identifiers -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    orders,
    products,
    order_items,
    order_shipping,
    order_notes,
    order_properties,
    order_identifiers,
);
