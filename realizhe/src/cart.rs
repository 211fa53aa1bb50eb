//! Shopping cart: quantities per product id, priced against the current catalog.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::catalog::Product;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn add(&mut self, product_id: &str) {
        match self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            Some(line) => line.quantity = line.quantity.saturating_add(1),
            None => self.lines.push(CartLine {
                product_id: product_id.to_string(),
                quantity: 1,
            }),
        }
    }

    /// Decrement by one; a line reaching zero is dropped.
    pub fn decrease(&mut self, product_id: &str) {
        for line in self
            .lines
            .iter_mut()
            .filter(|line| line.product_id == product_id)
        {
            line.quantity = line.quantity.saturating_sub(1);
        }
        self.lines.retain(|line| line.quantity > 0);
    }

    pub fn remove(&mut self, product_id: &str) {
        self.lines.retain(|line| line.product_id != product_id);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Price each line against `products`. Lines whose product is no longer
    /// listed are left out of the summary but stay in the cart.
    pub fn detail(&self, products: &[Product]) -> CartSummary {
        let items = self
            .lines
            .iter()
            .filter_map(|line| {
                let product = products.iter().find(|p| p.id == line.product_id)?;
                Some(CartItem {
                    line_total: f64::from(line.quantity) * product.price,
                    quantity: line.quantity,
                    product: product.clone(),
                })
            })
            .collect::<Vec<_>>();

        let total = items.iter().map(|item| item.line_total).sum();
        let total_items = items.iter().map(|item| item.quantity).sum();
        CartSummary {
            items,
            total,
            total_items,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
    pub line_total: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub total: f64,
    pub total_items: u32,
}

/// Cart id -> (cart, last touched). Idle carts expire after the TTL.
#[derive(Debug, Clone)]
pub struct CartStore {
    inner: Arc<DashMap<String, (Cart, Instant)>>,
    ttl: Duration,
}

impl CartStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn new_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn get(&self, cart_id: &str) -> Cart {
        let Some(entry) = self.inner.get(cart_id) else {
            return Cart::default();
        };
        if entry.1.elapsed() < self.ttl {
            entry.0.clone()
        } else {
            drop(entry);
            self.inner.remove(cart_id);
            Cart::default()
        }
    }

    /// Apply `change` to the cart and store the result.
    pub fn update(&self, cart_id: &str, change: impl FnOnce(&mut Cart)) -> Cart {
        let mut cart = self.get(cart_id);
        change(&mut cart);
        self.inner
            .insert(cart_id.to_string(), (cart.clone(), Instant::now()));
        cart
    }

    pub fn remove(&self, cart_id: &str) {
        self.inner.remove(cart_id);
    }

    /// Drop idle carts; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        self.inner
            .retain(|_, (_, touched)| touched.elapsed() < self.ttl);
        before.saturating_sub(self.inner.len())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Cart, CartStore};
    use crate::catalog::Product;

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: id.to_string(),
            slug: id.to_string(),
            name: format!("Box {id}"),
            description: String::new(),
            price,
            image_url: String::from("/images/placeholder.png"),
            image_path: None,
            category: None,
            highlights: Vec::new(),
            is_active: true,
        }
    }

    #[test]
    fn add_increments_existing_line() {
        let mut cart = Cart::default();
        cart.add("a");
        cart.add("b");
        cart.add("a");
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.lines()[1].quantity, 1);
    }

    #[test]
    fn decrease_drops_line_at_zero() {
        let mut cart = Cart::default();
        cart.add("a");
        cart.add("a");
        cart.decrease("a");
        assert_eq!(cart.lines()[0].quantity, 1);
        cart.decrease("a");
        assert!(cart.is_empty());
        cart.decrease("missing");
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_drops_the_whole_line_and_clear_empties() {
        let mut cart = Cart::default();
        cart.add("a");
        cart.add("a");
        cart.add("b");
        cart.remove("a");
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].product_id, "b");
        cart.add("c");
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn detail_prices_known_products_only() {
        let mut cart = Cart::default();
        cart.add("a");
        cart.add("a");
        cart.add("b");
        cart.add("gone");
        let summary = cart.detail(&[product("a", 30.0), product("b", 12.5)]);
        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.items[0].line_total, 60.0);
        assert_eq!(summary.total, 72.5);
        assert_eq!(summary.total_items, 3);
        assert_eq!(cart.lines().len(), 3);
    }

    #[test]
    fn store_updates_and_expires() {
        let store = CartStore::new(Duration::from_secs(3600));
        let id = store.new_id();
        store.update(&id, |cart| cart.add("a"));
        store.update(&id, |cart| cart.add("a"));
        assert_eq!(store.get(&id).lines()[0].quantity, 2);
        store.remove(&id);
        assert!(store.get(&id).is_empty());

        let expired = CartStore::new(Duration::ZERO);
        expired.update("x", |cart| cart.add("a"));
        assert!(expired.get("x").is_empty());
    }

    #[test]
    fn purge_drops_idle_carts() {
        let store = CartStore::new(Duration::ZERO);
        store.update("a", |cart| cart.add("p"));
        store.update("b", |cart| cart.add("p"));
        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.purge_expired(), 0);
    }
}
