//! Sort compiler: `Sort` → `OrderBy`, declaration order preserved.

use qshape_core::error::{Error, Result};
use qshape_core::expr::OrderBy;
use qshape_core::model::Sort;

/// Compile one sort. An absent descriptor is an error: silently dropping
/// it would change the result order without telling the caller.
pub fn compile_sort(sort: Option<&Sort>) -> Result<OrderBy> {
    let sort = sort.ok_or_else(|| Error::validation("not supported sorted by null sort field"))?;
    let order = OrderBy::new(sort.field.expr.clone(), sort.direction);

    #[cfg(feature = "tracing")]
    tracing::trace!(order = %order, "compiled sort");

    Ok(order)
}

/// Compile sorts in order. Duplicates are kept; nothing is merged.
pub fn compile_sorts<'s, I>(sorts: I) -> Result<Vec<OrderBy>>
where
    I: IntoIterator<Item = Option<&'s Sort>>,
{
    sorts.into_iter().map(compile_sort).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qshape_core::expr::{Direction, Expr};
    use qshape_core::model::FieldRef;
    use qshape_core::schema::DataType;

    fn price() -> FieldRef {
        FieldRef::column("products", "price", DataType::Float64)
    }

    #[test]
    fn test_absent_sort_fails() {
        assert!(matches!(compile_sort(None), Err(Error::Validation(_))));
    }

    #[test]
    fn test_direction_is_applied() {
        let order = compile_sort(Some(&Sort::desc(price()))).unwrap();
        assert_eq!(order.direction, Direction::Desc);
        assert_eq!(order.to_string(), "products.price desc");
    }

    #[test]
    fn test_order_and_duplicates_preserved() {
        let name = FieldRef::column("products", "product_name", DataType::Utf8);
        let sorts = [Sort::asc(name.clone()), Sort::desc(price()), Sort::asc(name)];
        let orders = compile_sorts(sorts.iter().map(Some)).unwrap();
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[0].expr, Expr::col("products", "product_name"));
        assert_eq!(orders[1].expr, Expr::col("products", "price"));
        assert_eq!(orders[2].expr, Expr::col("products", "product_name"));
    }

    #[test]
    fn test_absent_sort_in_batch_fails() {
        let sort = Sort::asc(price());
        assert!(compile_sorts([Some(&sort), None]).is_err());
    }
}
