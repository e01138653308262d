use business_marketplace_api::{
    db::{create_orm_conn, run_migrations},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;

    let (pool, orm) = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin12345", "admin").await?;
    let user_id = ensure_user(&pool, "user@example.com", "user12345", "user").await?;
    seed_listings(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_listings(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    // (title, description, category, location, asking price and revenue in cents)
    let listings = vec![
        (
            "Neighbourhood Coffee Roastery",
            "Profitable roastery with wholesale contracts and a busy cafe",
            "Food & Beverage",
            "Portland, OR",
            125_000_000_i64,
            Some(210_000_000_i64),
        ),
        (
            "B2B Invoicing SaaS",
            "Recurring revenue, 400 paying customers, low churn",
            "Software",
            "Remote",
            480_000_000,
            Some(96_000_000),
        ),
        (
            "Boutique Fitness Studio",
            "Two locations, established membership base",
            "Health & Fitness",
            "Austin, TX",
            32_500_000,
            None,
        ),
        (
            "Landscaping Services Company",
            "Residential and commercial contracts, equipment included",
            "Home Services",
            "Denver, CO",
            89_900_000,
            Some(150_000_000),
        ),
    ];

    for (title, description, category, location, asking_price, revenue) in listings {
        sqlx::query(
            r#"
            INSERT INTO listings (id, title, description, category, location, asking_price, annual_revenue)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE NOT EXISTS (SELECT 1 FROM listings WHERE title = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(description)
        .bind(category)
        .bind(location)
        .bind(asking_price)
        .bind(revenue)
        .execute(pool)
        .await?;
    }

    println!("Seeded listings");
    Ok(())
}
