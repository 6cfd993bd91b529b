use {
    super::{Tx, amount, count},
    crate::domain::{
        catalog::{GearListing, GearStock, ListingPrice, ServicePackage, Workshop},
        coupon::{Coupon, normalize_code},
        error::MarketError,
        event_order::OrderPricing,
        money::{MoneyAmount, Percent},
    },
    chrono::NaiveDate,
    sqlx::{Row, postgres::PgRow},
    uuid::Uuid,
};

fn listing_price(row: &PgRow) -> Result<ListingPrice, MarketError> {
    let vat_amount = row
        .try_get::<Option<i64>, _>("vat_amount")?
        .map(MoneyAmount::new)
        .transpose()?;
    let vat_percent = row
        .try_get::<Option<i32>, _>("vat_percent_bp")?
        .map(|bp| {
            u32::try_from(bp)
                .map(Percent::from_basis_points)
                .map_err(|_| MarketError::Validation(format!("negative vat percent: {bp}")))
        })
        .transpose()?;
    Ok(ListingPrice {
        price: amount(row, "price")?,
        vat_amount,
        vat_percent,
        main_price: amount(row, "main_price")?,
    })
}

pub async fn find_package(tx: &mut Tx, id: Uuid) -> Result<Option<ServicePackage>, MarketError> {
    let row = sqlx::query(
        r#"
        SELECT id, provider_id, title, price, vat_amount, price_with_service_fee,
               total_price, delivery_days
        FROM service_packages WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|row| {
        Ok(ServicePackage {
            id: row.try_get("id")?,
            provider_id: row.try_get("provider_id")?,
            title: row.try_get("title")?,
            pricing: OrderPricing {
                price: amount(&row, "price")?,
                vat_amount: amount(&row, "vat_amount")?,
                price_with_service_fee: amount(&row, "price_with_service_fee")?,
                total_price: amount(&row, "total_price")?,
            },
            delivery_days: count(&row, "delivery_days")?,
        })
    })
    .transpose()
}

pub async fn find_gear_listing(tx: &mut Tx, id: Uuid) -> Result<Option<GearListing>, MarketError> {
    let row = sqlx::query(
        r#"
        SELECT id, seller_id, title, price, vat_amount, vat_percent_bp, main_price, stock
        FROM gear_listings WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|row| {
        Ok(GearListing {
            id: row.try_get("id")?,
            seller_id: row.try_get("seller_id")?,
            title: row.try_get("title")?,
            price: listing_price(&row)?,
            stock: GearStock::try_from(row.try_get::<&str, _>("stock")?)?,
        })
    })
    .transpose()
}

pub async fn mark_sold_out(tx: &mut Tx, id: Uuid) -> Result<bool, MarketError> {
    let result = sqlx::query(
        "UPDATE gear_listings SET stock = 'Sold Out', updated_at = now() WHERE id = $1 AND stock <> 'Sold Out'",
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find_workshop(tx: &mut Tx, id: Uuid) -> Result<Option<Workshop>, MarketError> {
    let row = sqlx::query(
        r#"
        SELECT id, author_id, title, price, vat_amount, vat_percent_bp, main_price,
               starts_at, capacity, participant_count
        FROM workshops WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|row| {
        Ok(Workshop {
            id: row.try_get("id")?,
            author_id: row.try_get("author_id")?,
            title: row.try_get("title")?,
            price: listing_price(&row)?,
            starts_at: row.try_get("starts_at")?,
            capacity: count(&row, "capacity")?,
            participant_count: count(&row, "participant_count")?,
        })
    })
    .transpose()
}

pub async fn reserve_seat(tx: &mut Tx, workshop_id: Uuid) -> Result<bool, MarketError> {
    let result = sqlx::query(
        r#"
        UPDATE workshops
        SET participant_count = participant_count + 1, updated_at = now()
        WHERE id = $1 AND participant_count < capacity
        "#,
    )
    .bind(workshop_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn next_sequence(tx: &mut Tx, scope: &str, day: NaiveDate) -> Result<u32, MarketError> {
    let value: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO daily_sequences (scope, day, value) VALUES ($1, $2, 1)
        ON CONFLICT (scope, day) DO UPDATE SET value = daily_sequences.value + 1
        RETURNING value
        "#,
    )
    .bind(scope)
    .bind(day)
    .fetch_one(&mut **tx)
    .await?;

    u32::try_from(value).map_err(|_| MarketError::Validation(format!("bad sequence value {value}")))
}

pub async fn find_coupon(tx: &mut Tx, code: &str) -> Result<Option<Coupon>, MarketError> {
    let row = sqlx::query(
        r#"
        SELECT id, code, minimum_spend, amount, usage_limit, used_count, expires_at, is_active
        FROM coupons WHERE upper(code) = $1
        "#,
    )
    .bind(normalize_code(code))
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|row| {
        Ok(Coupon {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            minimum_spend: amount(&row, "minimum_spend")?,
            amount: amount(&row, "amount")?,
            usage_limit: count(&row, "usage_limit")?,
            used_count: count(&row, "used_count")?,
            expires_at: row.try_get("expires_at")?,
            is_active: row.try_get("is_active")?,
        })
    })
    .transpose()
}

/// Atomic increment guarded by the limit; no read-modify-write.
pub async fn consume_coupon(tx: &mut Tx, coupon_id: Uuid) -> Result<bool, MarketError> {
    let result = sqlx::query(
        r#"
        UPDATE coupons SET used_count = used_count + 1, updated_at = now()
        WHERE id = $1 AND used_count < usage_limit
        "#,
    )
    .bind(coupon_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}
