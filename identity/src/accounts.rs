//! Account id allocation.

use votestorm_types::AccountId;

/// Hands out 1-based account ids in increasing order.
#[derive(Debug)]
pub struct AccountAllocator {
    next: u64,
    limit: u64,
}

impl AccountAllocator {
    /// An allocator for ids `1..=count`.
    pub fn new(count: u32) -> Self {
        Self {
            next: 1,
            limit: u64::from(count),
        }
    }

    /// Every id this allocator will produce, in order.
    pub fn ids(count: u32) -> Vec<AccountId> {
        Self::new(count).collect()
    }

    /// Ids not yet handed out.
    pub fn remaining(&self) -> u32 {
        (self.limit + 1).saturating_sub(self.next) as u32
    }
}

impl Iterator for AccountAllocator {
    type Item = AccountId;

    fn next(&mut self) -> Option<AccountId> {
        if self.next > self.limit {
            return None;
        }
        let id = AccountId::new(self.next as u32);
        self.next += 1;
        Some(id)
    }
}
