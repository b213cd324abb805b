//! Northwind-style fixture shared by the end-to-end tests.

#![allow(dead_code)]

use qshape_core::convert::parse_timestamp_millis;
use qshape_core::prelude::{DataType, Field, Row, Scalar, Schema};
use qshape_exec::{MemoryCatalog, SelectStatement};
use qshape_registry::FieldRegistry;

pub const CATEGORIES: [(i32, &str, &str); 8] = [
    (1, "Beverages", "Soft drinks, coffees, teas, beers, and ales"),
    (2, "Condiments", "Sweet and savory sauces, relishes, spreads, and seasonings"),
    (3, "Confections", "Desserts, candies, and sweet breads"),
    (4, "Dairy Products", "Cheeses"),
    (5, "Grains/Cereals", "Breads, crackers, pasta, and cereal"),
    (6, "Meat/Poultry", "Prepared meats"),
    (7, "Produce", "Dried fruit and bean curd"),
    (8, "Seafood", "Seaweed and fish"),
];

pub const PRODUCTS: [(i32, &str, i32, f64, i32); 12] = [
    (1, "Chais", 1, 18.0, 39),
    (2, "Chang", 1, 19.0, 17),
    (3, "Aniseed Syrup", 2, 10.0, 13),
    (4, "Chef Anton's Cajun Seasoning", 2, 22.0, 53),
    (5, "Chef Anton's Gumbo Mix", 2, 21.35, 0),
    (6, "Grandma's Boysenberry Spread", 2, 25.0, 120),
    (7, "Uncle Bob's Organic Dried Pears", 7, 30.0, 15),
    (8, "Northwoods Cranberry Sauce", 2, 40.0, 6),
    (9, "Mishi Kobe Niku", 6, 97.0, 29),
    (10, "Ikura", 8, 31.0, 31),
    (11, "Queso Cabrales", 4, 21.0, 22),
    (12, "Queso Manchego La Pastora", 4, 38.0, 86),
];

pub const CUSTOMERS: [(&str, &str, &str, &str, Option<&str>); 8] = [
    ("ALFKI", "Alfreds Futterkiste", "Maria Anders", "Berlin", None),
    ("ANATR", "Ana Trujillo Emparedados y helados", "Ana Trujillo", "México D.F.", None),
    ("ANTON", "Antonio Moreno Taquería", "Antonio Moreno", "México D.F.", None),
    ("AROUT", "Around the Horn", "Thomas Hardy", "London", None),
    ("BERGS", "Berglunds snabbköp", "Christina Berglund", "Luleå", None),
    ("GREAL", "Great Lakes Food Market", "Howard Snyder", "Eugene", Some("OR")),
    ("HUNGC", "Hungry Coyote Import Store", "Yoshi Latimer", "Elgin", Some("OR")),
    ("LAZYK", "Lazy K Kountry Store", "John Steel", "Walla Walla", Some("WA")),
];

pub const ORDERS: [(i32, &str, &str, f64); 8] = [
    (10278, "BERGS", "1996-08-12", 92.69),
    (10308, "ANATR", "1996-09-18", 1.61),
    (10355, "AROUT", "1996-11-15", 41.95),
    (10365, "ANTON", "1996-11-27", 22.0),
    (10528, "GREAL", "1997-05-06", 3.35),
    (10643, "ALFKI", "1997-08-25", 29.46),
    (10692, "ALFKI", "1997-10-03", 61.02),
    (10702, "ALFKI", "1997-10-13", 23.94),
];

pub fn northwind() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();

    let categories = Schema::new(vec![
        Field::new("category_id", DataType::Int32, false),
        Field::new("category_name", DataType::Utf8, false),
        Field::new("description", DataType::Utf8, true),
    ]);
    let rows = CATEGORIES
        .iter()
        .map(|(id, name, description)| {
            vec![Scalar::I32(*id), Scalar::from(*name), Scalar::from(*description)]
        })
        .collect();
    catalog
        .create_table("categories", categories, rows)
        .expect("categories fixture");

    let products = Schema::new(vec![
        Field::new("product_id", DataType::Int32, false),
        Field::new("product_name", DataType::Utf8, false),
        Field::new("category_id", DataType::Int32, false),
        Field::new("unit_price", DataType::Float64, false),
        Field::new("units_in_stock", DataType::Int32, false),
    ]);
    let rows = PRODUCTS
        .iter()
        .map(|(id, name, category, price, stock)| {
            vec![
                Scalar::I32(*id),
                Scalar::from(*name),
                Scalar::I32(*category),
                Scalar::F64(*price),
                Scalar::I32(*stock),
            ]
        })
        .collect();
    catalog
        .create_table("products", products, rows)
        .expect("products fixture");

    let customers = Schema::new(vec![
        Field::new("customer_id", DataType::Utf8, false),
        Field::new("company_name", DataType::Utf8, false),
        Field::new("contact_name", DataType::Utf8, false),
        Field::new("city", DataType::Utf8, false),
        Field::new("region", DataType::Utf8, true),
    ]);
    let rows = CUSTOMERS
        .iter()
        .map(|(id, company, contact, city, region)| {
            vec![
                Scalar::from(*id),
                Scalar::from(*company),
                Scalar::from(*contact),
                Scalar::from(*city),
                Scalar::from(*region),
            ]
        })
        .collect();
    catalog
        .create_table("customers", customers, rows)
        .expect("customers fixture");

    let orders = Schema::new(vec![
        Field::new("order_id", DataType::Int32, false),
        Field::new("customer_id", DataType::Utf8, false),
        Field::new("order_date", DataType::Date64, false),
        Field::new("freight", DataType::Float64, false),
    ]);
    let rows = ORDERS
        .iter()
        .map(|(id, customer, date, freight)| {
            vec![
                Scalar::I32(*id),
                Scalar::from(*customer),
                Scalar::Date64(parse_timestamp_millis(date).expect("fixture date")),
                Scalar::F64(*freight),
            ]
        })
        .collect();
    catalog
        .create_table("orders", orders, rows)
        .expect("orders fixture");

    catalog
}

/// Symbolic keys as a request layer would expose them.
pub const PROPERTIES: [(&str, &str); 10] = [
    ("categoryId", "categories.category_id"),
    ("categoryName", "categories.category_name"),
    ("productId", "products.product_id"),
    ("productName", "products.product_name"),
    ("unitPrice", "products.unit_price"),
    ("unitsInStock", "products.units_in_stock"),
    ("contactName", "customers.contact_name"),
    ("region", "customers.region"),
    ("orderDate", "orders.order_date"),
    ("freight", "orders.freight"),
];

pub fn registry(catalog: &MemoryCatalog) -> FieldRegistry {
    FieldRegistry::from_properties(PROPERTIES, catalog).expect("registry fixture")
}

pub fn select_all(catalog: &MemoryCatalog, table: &str) -> SelectStatement {
    SelectStatement::select_from(catalog, table)
}

pub fn text(row: &Row, column: &str) -> String {
    row.get(column)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
