//! Static coupon catalog.

use serde::{Deserialize, Serialize};

/// A redeemable reward with a fixed points cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: String,
    pub name: String,
    pub points: i64,
}

impl Coupon {
    pub fn new(id: impl Into<String>, name: impl Into<String>, points: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            points,
        }
    }
}

/// Coupons offered by a deployment, in display order.
#[derive(Debug, Clone)]
pub struct Catalog {
    coupons: Vec<Coupon>,
}

impl Catalog {
    pub const fn new(coupons: Vec<Coupon>) -> Self {
        Self { coupons }
    }

    pub fn find(&self, id: &str) -> Option<&Coupon> {
        self.coupons.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coupon> {
        self.coupons.iter()
    }

    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            Coupon::new("coupon1", "10% Off at Green Mart", 100),
            Coupon::new("coupon2", "Free Coffee at EcoCafe", 50),
            Coupon::new("coupon3", "20% Off Recycled Clothing", 200),
            Coupon::new("coupon4", "Free Plant Seedling", 75),
            Coupon::new("coupon5", "15% Off Solar Gadgets", 150),
            Coupon::new("coupon6", "Free Eco-Bag", 30),
        ])
    }
}

/// A coupon as offered to the current viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponView {
    pub coupon: Coupon,
    pub redeemable: bool,
    pub label: &'static str,
}

impl CouponView {
    /// `balance` is `None` when nobody is signed in.
    pub fn new(coupon: &Coupon, balance: Option<i64>) -> Self {
        let (redeemable, label) = match balance {
            None => (false, "Login to Redeem"),
            Some(points) if points < coupon.points => (false, "Insufficient Points"),
            Some(_) => (true, "Redeem Now"),
        };
        Self {
            coupon: coupon.clone(),
            redeemable,
            label,
        }
    }
}
