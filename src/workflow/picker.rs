/// Winner selection over a budget response.
use crate::models::{ProviderId, QuoteResponse, SelectedQuote};

/// Prices whose text is this long or longer are treated as malformed.
pub const MAX_PRICE_TEXT_LEN: usize = 6;

/// Pick the first quote, in response order, whose price text is shorter
/// than [`MAX_PRICE_TEXT_LEN`] and parses as a number.
///
/// This is first-eligible, not cheapest: a later, lower price loses to an
/// earlier eligible one. Returns `None` when the response was not accepted
/// or nothing qualifies.
pub fn pick_winner(response: &QuoteResponse) -> Option<SelectedQuote> {
    if !response.is_accepted() {
        return None;
    }
    let job_id = response.job_id?;

    response.quotes.iter().find_map(|quote| {
        if quote.price.as_text().chars().count() >= MAX_PRICE_TEXT_LEN {
            return None;
        }
        let price = quote.price.value()?;
        let provider = quote.provider.trim().parse::<ProviderId>().ok()?;
        Some(SelectedQuote::new(job_id, provider, price))
    })
}
