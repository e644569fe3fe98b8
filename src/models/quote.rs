/// Budget responses and the quote chosen from them.
use crate::models::job::{JobId, ProviderId};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Payment method tag sent with every order confirmation.
pub const PAYMENT_METHOD: &str = "PROXYPRINT_PAYMENT";

/// A price as returned by a print shop: usually text such as `"2.50"`, but
/// numbers and error markers show up too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Text(String),
    Number(serde_json::Number),
    Other(serde_json::Value),
}

impl Price {
    /// Textual form the length bound is measured on.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Price::Text(s) => Cow::Borrowed(s.as_str()),
            Price::Number(n) => Cow::Owned(n.to_string()),
            Price::Other(v) => Cow::Owned(v.to_string()),
        }
    }

    /// Numeric value, if the price is a finite number.
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            Price::Text(s) => s.trim().parse::<f64>().ok()?,
            Price::Number(n) => n.as_f64()?,
            Price::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }
}

/// One provider's entry in a budget response.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// Provider key exactly as it appeared in the response.
    pub provider: String,
    pub price: Price,
}

/// Parsed answer of the budget endpoint.
///
/// `quotes` keeps the order the entries had in the response body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuoteResponse {
    #[serde(rename = "printRequestID", alias = "jobID", default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(rename = "budgets", default, deserialize_with = "ordered_quotes")]
    pub quotes: Vec<Quote>,
}

impl QuoteResponse {
    /// A response counts as accepted unless the service said otherwise.
    pub fn is_accepted(&self) -> bool {
        self.success != Some(false) && self.job_id.is_some()
    }
}

fn ordered_quotes<'de, D>(deserializer: D) -> Result<Vec<Quote>, D::Error>
where
    D: Deserializer<'de>,
{
    struct QuotesVisitor;

    impl<'de> Visitor<'de> for QuotesVisitor {
        type Value = Vec<Quote>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of provider id to price")
        }

        fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let mut quotes = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((provider, price)) = access.next_entry::<String, Price>()? {
                quotes.push(Quote { provider, price });
            }
            Ok(quotes)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(QuotesVisitor)
}

/// The quote a consumer confirms, in the service's wire names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedQuote {
    #[serde(rename = "printRequestID")]
    pub job_id: JobId,
    #[serde(rename = "printshopID")]
    pub provider_id: ProviderId,
    #[serde(rename = "budget")]
    pub price: f64,
    #[serde(rename = "paymentMethod")]
    pub payment_method: String,
}

impl SelectedQuote {
    pub fn new(job_id: JobId, provider_id: ProviderId, price: f64) -> Self {
        Self {
            job_id,
            provider_id,
            price,
            payment_method: PAYMENT_METHOD.to_string(),
        }
    }
}
