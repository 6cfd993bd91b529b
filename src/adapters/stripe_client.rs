use {
    crate::domain::{
        error::MarketError,
        id::SessionId,
        money::Currency,
        payment::GatewayStatus,
        provider::{CheckoutRequest, HostedSession, PaymentProvider},
    },
    std::{collections::HashMap, future::Future, pin::Pin},
};

/// Stripe Checkout behind the [`PaymentProvider`] seam.
pub struct StripeGateway {
    client: stripe::Client,
}

impl StripeGateway {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
        }
    }
}

impl PaymentProvider for StripeGateway {
    fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HostedSession, MarketError>> + Send + '_>> {
        Box::pin(async move { self.create_inner(request).await })
    }

    fn payment_status(
        &self,
        id: &SessionId,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayStatus, MarketError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move { self.status_inner(&id).await })
    }

    fn expire_checkout_session(
        &self,
        id: &SessionId,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayStatus, MarketError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move { self.expire_inner(&id).await })
    }
}

impl StripeGateway {
    async fn create_inner(&self, request: CheckoutRequest) -> Result<HostedSession, MarketError> {
        let payment_id = request.payment_id.to_string();
        let metadata = HashMap::from([
            ("payment_id".to_string(), payment_id.clone()),
            ("payer_id".to_string(), request.payer_id.to_string()),
        ]);

        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(stripe::CheckoutSessionMode::Payment);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.client_reference_id = Some(&payment_id);
        params.metadata = Some(metadata);
        params.expires_at = Some(request.expires_at.timestamp());
        params.line_items = Some(vec![stripe::CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency: to_stripe_currency(request.currency),
                unit_amount: Some(request.amount.cents()),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.description.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = stripe::CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| MarketError::Gateway(format!("Stripe API: {e}")))?;

        let url = session
            .url
            .ok_or_else(|| MarketError::Gateway("checkout session has no url".into()))?;
        Ok(HostedSession {
            id: SessionId::new(session.id.to_string())?,
            url,
        })
    }

    async fn status_inner(&self, id: &SessionId) -> Result<GatewayStatus, MarketError> {
        let session = stripe::CheckoutSession::retrieve(&self.client, &stripe_session_id(id)?, &[])
            .await
            .map_err(|e| MarketError::Gateway(format!("Stripe API: {e}")))?;

        Ok(convert_session_status(session.payment_status, session.status))
    }

    async fn expire_inner(&self, id: &SessionId) -> Result<GatewayStatus, MarketError> {
        match stripe::CheckoutSession::expire(&self.client, &stripe_session_id(id)?).await {
            Ok(session) => Ok(convert_session_status(session.payment_status, session.status)),
            // Stripe refuses to expire a session that is no longer open.
            Err(e) => match self.status_inner(id).await? {
                GatewayStatus::Pending => Err(MarketError::Gateway(format!("Stripe API: {e}"))),
                settled => Ok(settled),
            },
        }
    }
}

fn stripe_session_id(id: &SessionId) -> Result<stripe::CheckoutSessionId, MarketError> {
    id.as_str()
        .parse::<stripe::CheckoutSessionId>()
        .map_err(|e| MarketError::Validation(format!("invalid checkout session id: {e}")))
}

pub fn to_stripe_currency(c: Currency) -> stripe::Currency {
    match c {
        Currency::Usd => stripe::Currency::USD,
        Currency::Eur => stripe::Currency::EUR,
        Currency::Gbp => stripe::Currency::GBP,
        Currency::Jpy => stripe::Currency::JPY,
    }
}

/// Paid wins over an expired session status; anything undecided is pending.
pub fn convert_session_status(
    payment: stripe::CheckoutSessionPaymentStatus,
    status: Option<stripe::CheckoutSessionStatus>,
) -> GatewayStatus {
    match (payment, status) {
        (
            stripe::CheckoutSessionPaymentStatus::Paid
            | stripe::CheckoutSessionPaymentStatus::NoPaymentRequired,
            _,
        ) => GatewayStatus::Succeeded,
        (_, Some(stripe::CheckoutSessionStatus::Expired)) => GatewayStatus::Failed,
        _ => GatewayStatus::Pending,
    }
}
