//! End-to-end checkout flow against the in-memory engine: catalog setup,
//! web checkout, pack projection, cancellation, and reactivation.

use rust_decimal::Decimal;
use shared::{CustomerInfo, OrderStatus, SalesChannel, StockKind, UnitKind, Variant};

use bakery_server::db::DbService;
use bakery_server::db::repository::{
    OrderRepository, ProductCreate, ProductRepository, StockMovementRepository,
};
use bakery_server::stock::{CheckoutLine, CheckoutRequest, DeductionEngine, ReversalEngine};

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

struct Shop {
    svc: DbService,
    products: ProductRepository,
    deduction: DeductionEngine,
    reversal: ReversalEngine,
}

impl Shop {
    async fn open() -> Self {
        let svc = DbService::open_memory().await.unwrap();
        Self {
            products: ProductRepository::new(svc.db.clone()),
            deduction: DeductionEngine::new(svc.db.clone()),
            reversal: ReversalEngine::new(svc.db.clone()),
            svc,
        }
    }

    async fn seed_catalog(&self) {
        self.products
            .create(ProductCreate {
                id: Some("flour-bag".into()),
                name: "Flour Bag".into(),
                price: d("8.00"),
                wholesale_price: Some(d("6.00")),
                unit_kind: Some(UnitKind::Weight),
                is_visible: None,
                stock: StockKind::simple(d("20")),
            })
            .await
            .unwrap();
        self.products
            .create(ProductCreate {
                id: Some("bread-pack".into()),
                name: "Bread Pack".into(),
                price: d("12.50"),
                wholesale_price: None,
                unit_kind: None,
                is_visible: None,
                stock: StockKind::derived("flour-bag", d("2")),
            })
            .await
            .unwrap();
        self.products
            .create(ProductCreate {
                id: Some("t-shirt".into()),
                name: "T-Shirt".into(),
                price: d("15.00"),
                wholesale_price: None,
                unit_kind: None,
                is_visible: None,
                stock: StockKind::Variants {
                    variants: vec![Variant::new("Red", d("5")), Variant::new("Blue", d("3"))],
                },
            })
            .await
            .unwrap();
    }

    async fn checkout(&self, lines: Vec<CheckoutLine>) -> String {
        self.deduction
            .deduct(&CheckoutRequest {
                lines,
                customer: CustomerInfo::default(),
                channel: SalesChannel::Web,
            })
            .await
            .unwrap()
            .order_id
    }

    async fn flat_quantity(&self, id: &str) -> Decimal {
        self.products
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap()
            .stock
            .flat_quantity()
            .unwrap()
    }
}

fn line(id: &str, name: &str, qty: &str) -> CheckoutLine {
    CheckoutLine {
        line_id: id.into(),
        name: name.into(),
        quantity: qty.parse().unwrap(),
    }
}

#[tokio::test]
async fn mixed_cart_checkout_updates_every_ledger_shape() {
    let shop = Shop::open().await;
    shop.seed_catalog().await;

    // Seeding projected the pack from its parent
    assert_eq!(shop.flat_quantity("bread-pack").await, d("10"));

    let order_id = shop
        .checkout(vec![
            line("flour-bag", "Flour Bag", "1.5"),
            line("bread-pack", "Bread Pack", "3"),
            line("t-shirt-Red", "T-Shirt (Red)", "2"),
        ])
        .await;

    // Flat: 20 - 1.5 direct - 6 via packs
    assert_eq!(shop.flat_quantity("flour-bag").await, d("12.5"));
    // Projection follows: floor(12.5 / 2)
    assert_eq!(shop.flat_quantity("bread-pack").await, d("6"));
    let shirt = shop.products.find_by_id("t-shirt").await.unwrap().unwrap();
    assert_eq!(shirt.stock.variant("Red").unwrap().quantity, d("3"));
    assert_eq!(shirt.stock.variant("Blue").unwrap().quantity, d("3"));

    let order = OrderRepository::new(shop.svc.db.clone())
        .find_by_id(&order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(!order.payment_approved, "web orders await the gateway webhook");
    // 1.5 * 8.00 + 3 * 12.50 + 2 * 15.00
    assert_eq!(order.total, d("79.50"));
}

#[tokio::test]
async fn cancel_then_reactivate_conserves_the_ledger() {
    let shop = Shop::open().await;
    shop.seed_catalog().await;

    let order_id = shop
        .checkout(vec![
            line("bread-pack", "Bread Pack", "3"),
            line("t-shirt-Red", "T-Shirt (Red)", "5"),
        ])
        .await;
    assert_eq!(shop.flat_quantity("flour-bag").await, d("14"));
    let shirt = shop.products.find_by_id("t-shirt").await.unwrap().unwrap();
    let red = shirt.stock.variant("Red").unwrap();
    assert_eq!(red.quantity, Decimal::ZERO);
    assert!(!red.in_stock);

    // Cancel: everything comes back, including the pack projection
    shop.reversal
        .apply_status_change(&order_id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(shop.flat_quantity("flour-bag").await, d("20"));
    assert_eq!(shop.flat_quantity("bread-pack").await, d("10"));
    let shirt = shop.products.find_by_id("t-shirt").await.unwrap().unwrap();
    let red = shirt.stock.variant("Red").unwrap();
    assert_eq!(red.quantity, d("5"));
    assert!(red.in_stock);

    // Reactivate: back to the post-sale state
    shop.reversal
        .apply_status_change(&order_id, OrderStatus::Preparing)
        .await
        .unwrap();
    assert_eq!(shop.flat_quantity("flour-bag").await, d("14"));
    assert_eq!(
        shop.products
            .find_by_id("t-shirt")
            .await
            .unwrap()
            .unwrap()
            .stock
            .variant("Red")
            .unwrap()
            .quantity,
        Decimal::ZERO
    );
}

#[tokio::test]
async fn audit_trail_records_every_ledger_mutation() {
    let shop = Shop::open().await;
    shop.seed_catalog().await;

    let order_id = shop.checkout(vec![line("bread-pack", "Bread Pack", "2")]).await;
    shop.reversal
        .apply_status_change(&order_id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let movements = StockMovementRepository::new(shop.svc.db.clone())
        .find_by_product("flour-bag")
        .await
        .unwrap();
    // Sale OUT then cancel IN, both against the parent; the pack projection
    // itself never generates movements
    assert_eq!(movements.len(), 2);
    assert!(movements.iter().all(|m| m.quantity == d("4")));
    assert!(
        movements
            .iter()
            .all(|m| m.observation.as_deref() == Some(format!("order {order_id}").as_str()))
    );
    let pack_movements = StockMovementRepository::new(shop.svc.db.clone())
        .find_by_product("bread-pack")
        .await
        .unwrap();
    assert!(pack_movements.is_empty());
}

#[tokio::test]
async fn pack_sale_exceeding_parent_stock_is_rejected() {
    let shop = Shop::open().await;
    shop.seed_catalog().await;

    let err = shop
        .deduction
        .deduct(&CheckoutRequest {
            lines: vec![line("bread-pack", "Bread Pack", "11")],
            customer: CustomerInfo::default(),
            channel: SalesChannel::Web,
        })
        .await
        .unwrap_err();
    // 11 packs need 22 units of a 20-unit parent
    assert!(matches!(
        err,
        shared::StockError::InsufficientStock { requested, available, .. }
            if requested == d("22") && available == d("20")
    ));
}
