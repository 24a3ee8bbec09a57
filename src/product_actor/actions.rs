/// Custom actions for Product entities.
///
/// Each action runs inside the products actor, so the stock check and the
/// mutation it guards can never interleave with another request. Reservations
/// are keyed by order id, which makes every action safe to repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductAction {
    /// Reads the current stock level without modifying it.
    #[cfg(test)]
    CheckStock,
    /// Moves `quantity` units from stock into a hold for `order_id` if that
    /// much is available. Repeating it for the same order changes nothing.
    ///
    /// # Errors
    /// Fails with `InsufficientStock` and leaves stock untouched otherwise.
    Reserve { order_id: String, quantity: u32 },
    /// Returns the units held for `order_id` to stock.
    Release { order_id: String },
    /// Drops the hold for `order_id` once its units have left the shelf.
    Commit { order_id: String },
}

/// Results from ProductActions - variants match 1:1 with ProductAction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductActionResult {
    #[cfg(test)]
    StockLevel(u32),
    Reserved { remaining: u32 },
    /// `quantity` is zero when the order held nothing.
    Released { quantity: u32, stock: u32 },
    Committed { quantity: u32 },
}
