use {
    super::{Tx, amount, unique_violation},
    crate::domain::{
        error::MarketError,
        event_order::{Cancellation, EventOrder, ExtensionRequest, OrderKind, OrderPricing},
        gear_order::GearOrder,
        lifecycle::Lifecycle,
        workshop::{Payout, WorkshopParticipant},
    },
    sqlx::{Row, postgres::PgRow, types::Json},
    uuid::Uuid,
};

// ── event orders ───────────────────────────────────────────────

fn event_order_from_row(row: &PgRow) -> Result<EventOrder, MarketError> {
    Ok(EventOrder {
        id: row.try_get("id")?,
        kind: OrderKind::try_from(row.try_get::<&str, _>("kind")?)?,
        requester_id: row.try_get("requester_id")?,
        provider_id: row.try_get("provider_id")?,
        package_id: row.try_get("package_id")?,
        description: row.try_get("description")?,
        pricing: row
            .try_get::<Option<Json<OrderPricing>>, _>("pricing")?
            .map(|j| j.0),
        delivery_date: row.try_get("delivery_date")?,
        extension_requests: row
            .try_get::<Json<Vec<ExtensionRequest>>, _>("extension_requests")?
            .0,
        cancellation: row
            .try_get::<Option<Json<Cancellation>>, _>("cancellation")?
            .map(|j| j.0),
        payment_id: row.try_get("payment_id")?,
        is_deleted: row.try_get("is_deleted")?,
        log: row.try_get::<Json<_>, _>("status_log")?.0,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn find_event_order(tx: &mut Tx, id: Uuid) -> Result<Option<EventOrder>, MarketError> {
    let row = sqlx::query(
        r#"
        SELECT id, kind, requester_id, provider_id, package_id, description, pricing,
               delivery_date, extension_requests, cancellation, payment_id, is_deleted,
               status_log, created_at
        FROM event_orders WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    row.as_ref().map(event_order_from_row).transpose()
}

pub async fn insert_event_order(tx: &mut Tx, order: &EventOrder) -> Result<(), MarketError> {
    sqlx::query(
        r#"
        INSERT INTO event_orders
            (id, kind, requester_id, provider_id, package_id, description, pricing,
             delivery_date, extension_requests, cancellation, payment_id, is_deleted,
             status, status_log, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(order.id)
    .bind(order.kind.as_str())
    .bind(order.requester_id)
    .bind(order.provider_id)
    .bind(order.package_id)
    .bind(order.description.as_deref())
    .bind(order.pricing.map(Json))
    .bind(order.delivery_date)
    .bind(Json(&order.extension_requests))
    .bind(order.cancellation.as_ref().map(Json))
    .bind(order.payment_id)
    .bind(order.is_deleted)
    .bind(order.status().as_str())
    .bind(Json(&order.log))
    .bind(order.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn update_event_order(tx: &mut Tx, order: &EventOrder) -> Result<(), MarketError> {
    let result = sqlx::query(
        r#"
        UPDATE event_orders
        SET pricing = $2, delivery_date = $3, extension_requests = $4, cancellation = $5,
            payment_id = $6, is_deleted = $7, status = $8, status_log = $9, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(order.id)
    .bind(order.pricing.map(Json))
    .bind(order.delivery_date)
    .bind(Json(&order.extension_requests))
    .bind(order.cancellation.as_ref().map(Json))
    .bind(order.payment_id)
    .bind(order.is_deleted)
    .bind(order.status().as_str())
    .bind(Json(&order.log))
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(MarketError::not_found("event order", order.id));
    }
    Ok(())
}

// ── gear orders ────────────────────────────────────────────────

pub async fn find_gear_order(tx: &mut Tx, id: Uuid) -> Result<Option<GearOrder>, MarketError> {
    let row = sqlx::query(
        r#"
        SELECT id, buyer_id, seller_id, listing_id, price, vat_amount, total_price,
               payment_id, is_deleted, status_log, created_at
        FROM gear_orders WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|row| {
        Ok(GearOrder {
            id: row.try_get("id")?,
            buyer_id: row.try_get("buyer_id")?,
            seller_id: row.try_get("seller_id")?,
            listing_id: row.try_get("listing_id")?,
            price: amount(&row, "price")?,
            vat_amount: amount(&row, "vat_amount")?,
            total_price: amount(&row, "total_price")?,
            payment_id: row.try_get("payment_id")?,
            is_deleted: row.try_get("is_deleted")?,
            log: row.try_get::<Json<_>, _>("status_log")?.0,
            created_at: row.try_get("created_at")?,
        })
    })
    .transpose()
}

pub async fn insert_gear_order(tx: &mut Tx, order: &GearOrder) -> Result<(), MarketError> {
    sqlx::query(
        r#"
        INSERT INTO gear_orders
            (id, buyer_id, seller_id, listing_id, price, vat_amount, total_price,
             payment_id, is_deleted, status, status_log, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(order.id)
    .bind(order.buyer_id)
    .bind(order.seller_id)
    .bind(order.listing_id)
    .bind(order.price.cents())
    .bind(order.vat_amount.cents())
    .bind(order.total_price.cents())
    .bind(order.payment_id)
    .bind(order.is_deleted)
    .bind(order.status().as_str())
    .bind(Json(&order.log))
    .bind(order.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn update_gear_order(tx: &mut Tx, order: &GearOrder) -> Result<(), MarketError> {
    let result = sqlx::query(
        r#"
        UPDATE gear_orders
        SET payment_id = $2, is_deleted = $3, status = $4, status_log = $5, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(order.id)
    .bind(order.payment_id)
    .bind(order.is_deleted)
    .bind(order.status().as_str())
    .bind(Json(&order.log))
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(MarketError::not_found("gear order", order.id));
    }
    Ok(())
}

// ── workshop participants ──────────────────────────────────────

const PARTICIPANT_COLUMNS: &str = "id, order_code, workshop_id, client_id, author_id, \
     payment_id, total_price, payout, is_deleted, status_log, created_at";

fn participant_from_row(row: &PgRow) -> Result<WorkshopParticipant, MarketError> {
    Ok(WorkshopParticipant {
        id: row.try_get("id")?,
        order_code: row.try_get("order_code")?,
        workshop_id: row.try_get("workshop_id")?,
        client_id: row.try_get("client_id")?,
        author_id: row.try_get("author_id")?,
        payment_id: row.try_get("payment_id")?,
        total_price: amount(row, "total_price")?,
        payout: row.try_get::<Json<Payout>, _>("payout")?.0,
        is_deleted: row.try_get("is_deleted")?,
        log: row.try_get::<Json<_>, _>("status_log")?.0,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn find_participant(
    tx: &mut Tx,
    id: Uuid,
) -> Result<Option<WorkshopParticipant>, MarketError> {
    let row = sqlx::query(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM workshop_participants WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    row.as_ref().map(participant_from_row).transpose()
}

pub async fn find_participant_for(
    tx: &mut Tx,
    workshop_id: Uuid,
    client_id: Uuid,
) -> Result<Option<WorkshopParticipant>, MarketError> {
    let row = sqlx::query(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM workshop_participants \
         WHERE workshop_id = $1 AND client_id = $2 AND NOT is_deleted"
    ))
    .bind(workshop_id)
    .bind(client_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.as_ref().map(participant_from_row).transpose()
}

pub async fn insert_participant(tx: &mut Tx, p: &WorkshopParticipant) -> Result<(), MarketError> {
    sqlx::query(
        r#"
        INSERT INTO workshop_participants
            (id, order_code, workshop_id, client_id, author_id, payment_id, total_price,
             payout, is_deleted, status, status_log, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(p.id)
    .bind(&p.order_code)
    .bind(p.workshop_id)
    .bind(p.client_id)
    .bind(p.author_id)
    .bind(p.payment_id)
    .bind(p.total_price.cents())
    .bind(Json(&p.payout))
    .bind(p.is_deleted)
    .bind(p.status().as_str())
    .bind(Json(&p.log))
    .bind(p.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| unique_violation(e, format!("participant order {} already exists", p.order_code)))?;
    Ok(())
}

pub async fn update_participant(tx: &mut Tx, p: &WorkshopParticipant) -> Result<(), MarketError> {
    let result = sqlx::query(
        r#"
        UPDATE workshop_participants
        SET payout = $2, is_deleted = $3, status = $4, status_log = $5, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(p.id)
    .bind(Json(&p.payout))
    .bind(p.is_deleted)
    .bind(p.status().as_str())
    .bind(Json(&p.log))
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(MarketError::not_found("workshop participant", p.id));
    }
    Ok(())
}
