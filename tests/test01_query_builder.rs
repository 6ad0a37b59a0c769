mod common;

use catalog_service::prelude::*;
use catalog_service::query_builder::{Projection, compose, compose_count};
use common::{TestEnv, new_item};

const ITEMS: Projection = Projection {
    columns: "i.id AS id, i.name AS name, i.price AS price",
    from: "items i",
};

const SORTABLE: &[SortColumn] = &[
    SortColumn::new("id", "i.id"),
    SortColumn::new("name", "i.name"),
    SortColumn::new("price", "i.price"),
];

fn spec(name: Option<&str>, min: Option<f64>, max: Option<f64>) -> FilterSpec {
    FilterSpec::new()
        .contains("i.name", name)
        .at_least("i.price", min)
        .at_most("i.price", max)
}

/// Every optional-filter combination produces as many placeholders as arguments, with
/// the page arguments last.
#[test]
fn placeholders_track_arguments_for_every_combination() {
    let names = [None, Some("lamp")];
    let mins = [None, Some(1.0)];
    let maxs = [None, Some(9.0)];
    for name in names {
        for min in mins {
            for max in maxs {
                let filter = build_filter(&spec(name, min, max));
                let order = build_order("price", SortDirection::Asc, SORTABLE, "i.id").unwrap();
                let page = build_page(20, 10, 100).unwrap();
                let plan = compose(&ITEMS, &filter, &order, &page);

                let expected = usize::from(name.is_some())
                    + usize::from(min.is_some())
                    + usize::from(max.is_some());
                assert_eq!(plan.args.len(), expected + 2, "{}", plan.sql);
                assert_eq!(plan.placeholder_count(), plan.args.len(), "{}", plan.sql);
                assert_eq!(plan.args[expected], SqlValue::Int(10));
                assert_eq!(plan.args[expected + 1], SqlValue::Int(20));
                assert_eq!(plan.sql.contains(" WHERE "), expected > 0);

                let count = compose_count(&ITEMS, &filter);
                assert_eq!(count.args.len(), expected);
            }
        }
    }
}

#[test]
fn hostile_values_stay_in_the_argument_list() {
    let hostile = "'; DROP TABLE x; --";
    let filter = build_filter(&spec(Some(hostile), None, None));
    let order = build_order("name", SortDirection::Desc, SORTABLE, "i.id").unwrap();
    let page = build_page(0, 10, 100).unwrap();
    let plan = compose(&ITEMS, &filter, &order, &page);

    let benign = compose(
        &ITEMS,
        &build_filter(&spec(Some("lamp"), None, None)),
        &order,
        &page,
    );
    assert_eq!(plan.sql, benign.sql);
    assert!(!plan.sql.contains("DROP"));
    assert!(plan.args.iter().any(|a| a.as_text().is_some_and(|t| t.contains("DROP TABLE x"))));
}

#[test]
fn hostile_sort_fields_are_rejected() {
    for sort_by in ["price; DROP TABLE items", "i.price", "PRICE", "", "1"] {
        assert!(
            matches!(
                build_order(sort_by, SortDirection::Asc, SORTABLE, "i.id"),
                Err(CatalogError::InvalidSortField(_))
            ),
            "{sort_by} accepted"
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn hostile_filter_runs_harmlessly() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let items = env.items();
    items.create(new_item("Desk lamp", 30.0)).await?;
    items.create(new_item("100% wool", 12.0)).await?;

    let filter = ItemFilter {
        name: Some("'; DROP TABLE items; --".into()),
        ..ItemFilter::default()
    };
    let page = items.list(&filter, &ListParams::default()).await?;
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
    assert_eq!(env.count("items").await?, 2);

    // `%` is matched literally, not as a wildcard.
    let filter = ItemFilter {
        name: Some("100%".into()),
        ..ItemFilter::default()
    };
    let page = items.list(&filter, &ListParams::default()).await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].name, "100% wool");
    Ok(())
}
