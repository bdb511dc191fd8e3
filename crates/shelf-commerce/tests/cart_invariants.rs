//! Random mutation sequences never commit more than a pool holds.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shelf_commerce::prelude::*;

fn catalog() -> Catalog {
    let usd = |cents| Money::new(cents, Currency::USD);
    Catalog::from_products(
        Currency::USD,
        [
            Product::new("mug", "Mug", usd(1200)).with_stock(4),
            Product::new("tee", "Tee", usd(2000))
                .with_variant(ProductVariant::new("s", "Small", 3))
                .with_variant(ProductVariant::new("m", "Medium", 1)),
            Product::new("card", "Card", usd(300))
                .with_stock(6)
                .with_extra(Extra::new("envelope", "Envelope").with_price(usd(50))),
        ],
    )
}

fn random_request(rng: &mut StdRng) -> LineRequest {
    let quantity = rng.gen_range(-1..=5);
    match rng.gen_range(0..5) {
        0 => LineRequest::new("mug", quantity),
        1 => LineRequest::new("tee", quantity).variant("s"),
        2 => LineRequest::new("tee", quantity).variant("m"),
        3 => LineRequest::new("card", quantity).field("message", "hi"),
        _ => LineRequest::new("card", quantity).extra(ExtraSelection::new("envelope", 1)),
    }
}

fn assert_pools_within_stock(cart: &Cart, catalog: &Catalog) {
    for line in &cart.lines {
        assert!(line.quantity > 0, "line {} has quantity {}", line.id, line.quantity);

        let pool = line.pool();
        let product = catalog.get(&line.product_id).unwrap();
        let stock = product.pool_stock(line.variant_id.as_ref()).unwrap();
        let committed = cart.committed_to_pool(&pool, None);
        assert!(
            committed <= stock,
            "pool {} holds {} but the cart commits {}",
            pool,
            stock,
            committed
        );
    }
}

#[test]
fn test_random_mutations_respect_pool_stock() {
    let catalog = catalog();

    for seed in 0..64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut cart = Cart::new(Identity::guest("g1"), Currency::USD);

        for _ in 0..40 {
            match rng.gen_range(0..10) {
                0..=5 => {
                    let _ = cart.add_line(&catalog, random_request(&mut rng));
                }
                6..=8 if !cart.is_empty() => {
                    let index = rng.gen_range(0..cart.len());
                    let id = cart.lines[index].id.clone();
                    let before = cart.clone();
                    let result = cart.update_line_quantity(&catalog, &id, rng.gen_range(-1..=6));
                    if result.is_err() {
                        assert_eq!(cart, before);
                    }
                }
                _ if !cart.is_empty() => {
                    let id = cart.lines[rng.gen_range(0..cart.len())].id.clone();
                    assert!(cart.remove_line(&id).is_some());
                }
                _ => {}
            }
            assert_pools_within_stock(&cart, &catalog);
        }
    }
}

#[test]
fn test_rejected_adds_leave_cart_unchanged() {
    let catalog = catalog();
    let mut rng = StdRng::seed_from_u64(7);
    let mut cart = Cart::new(Identity::guest("g1"), Currency::USD);

    for _ in 0..200 {
        let before = cart.clone();
        if cart.add_line(&catalog, random_request(&mut rng)).is_err() {
            assert_eq!(cart, before);
        }
    }
    assert!(cart.count() <= 4 + 3 + 1 + 6);
}
