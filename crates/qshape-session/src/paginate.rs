//! Pagination engine.

use qshape_core::error::{Error, Result};
use qshape_core::model::Page;
use qshape_exec::Statement;

/// Count the rows `statement` currently matches, then window it to `page`.
///
/// The count runs before the limit is applied, so the returned total covers
/// the whole filtered set whatever page is requested. Orderings already on
/// the statement are kept for the windowed fetch.
pub fn paginate<S: Statement>(statement: &mut S, page: &Page) -> Result<u64> {
    let total = statement.execute_count().map_err(Error::execution)?;
    statement.add_limit(page.offset(), page.size());

    #[cfg(feature = "tracing")]
    tracing::debug!(
        total,
        number = page.number(),
        offset = page.offset(),
        size = page.size(),
        "paginated statement"
    );

    Ok(total)
}
