use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use storefront_api::cart::{CartEvent, CartLine, CartStore, MemorySlot};
use uuid::Uuid;

fn line(product_id: Uuid, name: &str, cents: u32, quantity: u32) -> CartLine {
    CartLine {
        product_id,
        name: name.to_string(),
        unit_price: Decimal::new(cents as i64, 2),
        quantity,
        image_url: None,
    }
}

proptest! {
    /// Merge law: adding the same product with quantities q1 and q2 yields
    /// one line with quantity q1+q2, never two entries.
    #[test]
    fn merging_adds_quantities(q1 in 1u32..1000, q2 in 1u32..1000) {
        let store = CartStore::new(Arc::new(MemorySlot::new()));
        let id = Uuid::new_v4();

        store.add_item(line(id, "Widget", 999, q1));
        store.add_item(line(id, "Widget", 999, q2));

        let lines = store.lines();
        prop_assert_eq!(lines.len(), 1);
        prop_assert_eq!(lines[0].quantity, q1 + q2);
    }

    /// Round-trip law: everything written to storage reads back identically,
    /// order and values preserved.
    #[test]
    fn round_trip_preserves_lines(
        entries in proptest::collection::vec(
            ("[a-zA-Z ]{1,24}", 1u32..100_000, 1u32..100),
            1..10,
        )
    ) {
        let store = CartStore::new(Arc::new(MemorySlot::new()));
        let mut expected = Vec::new();

        for (name, cents, quantity) in entries {
            let item = line(Uuid::new_v4(), &name, cents, quantity);
            expected.push(item.clone());
            store.add_item(item);
        }

        // Fresh store over the same slot simulates a re-mounted surface
        prop_assert_eq!(store.lines(), expected);
    }

    /// Totals are exact decimal sums of the price snapshots.
    #[test]
    fn total_is_sum_of_line_totals(
        entries in proptest::collection::vec((1u32..100_000, 1u32..100), 1..8)
    ) {
        let store = CartStore::new(Arc::new(MemorySlot::new()));
        let mut expected = Decimal::ZERO;

        for (cents, quantity) in entries {
            expected += Decimal::new(cents as i64, 2) * Decimal::from(quantity);
            store.add_item(line(Uuid::new_v4(), "Item", cents, quantity));
        }

        prop_assert_eq!(store.total(), expected);
    }
}

#[test]
fn checkout_completion_in_another_context_clears_the_cart_everywhere() {
    // The storefront tab builds the cart; the success page (a different
    // browsing context over the same storage) clears it after payment.
    let slot: Arc<MemorySlot> = Arc::new(MemorySlot::new());
    let storefront_tab = CartStore::new(slot.clone());
    let success_tab = CartStore::new(slot);

    storefront_tab.add_item(line(Uuid::new_v4(), "Widget", 999, 2));
    assert_eq!(storefront_tab.item_count(), 2);

    let mut storefront_watch = storefront_tab.watch_slot();
    success_tab.clear();

    // The storage change notification reaches the original tab, which
    // re-reads and finds the cart empty
    assert!(storefront_watch.try_recv().is_ok());
    assert!(storefront_tab.is_empty());
}

#[test]
fn same_process_subscribers_see_every_mutation() {
    let store = CartStore::new(Arc::new(MemorySlot::new()));
    let mut events = store.subscribe();
    let id = Uuid::new_v4();

    store.add_item(line(id, "Widget", 999, 1));
    store.update_quantity(id, 4);
    store.remove_item(id);

    assert_eq!(events.try_recv().unwrap(), CartEvent::Updated);
    assert_eq!(events.try_recv().unwrap(), CartEvent::Updated);
    assert_eq!(events.try_recv().unwrap(), CartEvent::Updated);
    assert!(events.try_recv().is_err());
}

#[test]
fn guard_noops_do_not_notify() {
    let store = CartStore::new(Arc::new(MemorySlot::new()));
    let id = Uuid::new_v4();
    store.add_item(line(id, "Widget", 999, 1));

    let mut events = store.subscribe();
    store.update_quantity(id, 0);
    store.update_quantity(Uuid::new_v4(), 5);
    store.remove_item(Uuid::new_v4());

    assert!(events.try_recv().is_err());
}
