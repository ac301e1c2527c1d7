use bigdecimal::BigDecimal;
use diesel::insert_into;
use diesel::prelude::*;
use furniture_shop::catalog::slugify;
use furniture_shop::establish_connection;
use furniture_shop::insertables::{NewCategory, NewProduct, NewUser};
use furniture_shop::schema::{categories, products, users};
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fs;

const SEED_DIR: &str = "seeds";

#[derive(Deserialize)]
struct SeedCategory {
    name: String,
}

#[derive(Deserialize)]
struct SeedProduct {
    category: String,
    name: String,
    price: BigDecimal,
    #[serde(default)]
    discount: i32,
    rating: BigDecimal,
    description: Option<String>,
}

fn read_json<T: for<'de> Deserialize<'de>>(file: &str) -> Result<T, Box<dyn Error>> {
    let raw = fs::read_to_string(format!("{SEED_DIR}/{file}"))
        .map_err(|e| format!("can't open {file}: {e}"))?;
    Ok(serde_json::from_str(&raw)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let connection = &mut establish_connection(&database_url)?;

    let seed_categories: Vec<SeedCategory> = read_json("categories.json")?;
    let seed_products: Vec<SeedProduct> = read_json("products.json")?;
    let seed_users: Vec<NewUser> = read_json("users.json")?;

    connection.transaction::<_, Box<dyn Error>, _>(|conn| {
        let new_categories: Vec<NewCategory> = seed_categories
            .iter()
            .map(|c| NewCategory {
                name: c.name.clone(),
                slug: slugify(&c.name),
            })
            .collect();
        insert_into(categories::table)
            .values(&new_categories)
            .on_conflict(categories::slug)
            .do_nothing()
            .execute(conn)?;

        let category_ids: HashMap<String, i32> = categories::table
            .select((categories::slug, categories::id))
            .load::<(String, i32)>(conn)?
            .into_iter()
            .collect();

        let mut new_products = Vec::with_capacity(seed_products.len());
        for product in seed_products {
            let slug = slugify(&product.category);
            let category_id = *category_ids
                .get(&slug)
                .ok_or_else(|| format!("product {:?} names unknown category {slug:?}", product.name))?;
            new_products.push(NewProduct {
                category_id,
                slug: slugify(&product.name),
                name: product.name,
                price: product.price,
                discount: product.discount,
                rating: product.rating,
                description: product.description,
            });
        }
        insert_into(products::table)
            .values(&new_products)
            .on_conflict(products::slug)
            .do_nothing()
            .execute(conn)?;

        insert_into(users::table)
            .values(&seed_users)
            .on_conflict_do_nothing()
            .execute(conn)?;
        Ok(())
    })?;

    println!(
        "seeded {} categories, {} users",
        seed_categories.len(),
        seed_users.len()
    );
    Ok(())
}
