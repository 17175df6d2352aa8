//! Deterministic A/B assignment
//!
//! A recipient's bucket is `sha256("{campaign_id}:{email}")`, read as a
//! big-endian u64 from the first eight bytes, modulo 100. Buckets below the
//! split percentage receive variant A. The result depends only on the
//! campaign and the address, so re-running assignment after a crash
//! reproduces it exactly.

use mailcast_core::{normalize_email, CampaignId, Recipient, Variant};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Bucket (0-99) of an address within a campaign
pub fn bucket(campaign_id: CampaignId, email: &str) -> u8 {
    let digest = Sha256::digest(format!("{}:{}", campaign_id, normalize_email(email)).as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}

/// Splits recipients between variants A and B
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantAssigner {
    campaign_id: CampaignId,
    /// Percentage routed to variant A
    split_percentage: u8,
}

impl VariantAssigner {
    pub fn new(campaign_id: CampaignId, split_percentage: u8) -> Self {
        Self {
            campaign_id,
            split_percentage: split_percentage.min(100),
        }
    }

    pub fn variant_for(&self, email: &str) -> Variant {
        if bucket(self.campaign_id, email) < self.split_percentage {
            Variant::A
        } else {
            Variant::B
        }
    }

    /// Variant per normalized email
    pub fn assign(&self, recipients: &[Recipient]) -> BTreeMap<String, Variant> {
        recipients
            .iter()
            .map(|r| (normalize_email(&r.email), self.variant_for(&r.email)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipients(n: usize) -> Vec<Recipient> {
        (0..n)
            .map(|i| Recipient::new(&format!("user{}@example.ie", i), Some(i as u64)))
            .collect()
    }

    #[test]
    fn test_assignment_is_stable() {
        let list = recipients(200);
        let first = VariantAssigner::new(42, 50).assign(&list);
        let mut reversed = list.clone();
        reversed.reverse();
        let second = VariantAssigner::new(42, 50).assign(&reversed);
        assert_eq!(first, second);
    }

    #[test]
    fn test_extreme_splits() {
        let list = recipients(100);
        assert!(VariantAssigner::new(1, 0)
            .assign(&list)
            .values()
            .all(|v| *v == Variant::B));
        assert!(VariantAssigner::new(1, 100)
            .assign(&list)
            .values()
            .all(|v| *v == Variant::A));
    }

    #[test]
    fn test_split_is_roughly_honoured() {
        let list = recipients(2000);
        let a = VariantAssigner::new(9, 30)
            .assign(&list)
            .values()
            .filter(|v| **v == Variant::A)
            .count();
        assert!((450..=750).contains(&a), "got {} in A", a);
    }

    #[test]
    fn test_bucket_ignores_case_and_depends_on_campaign() {
        assert_eq!(bucket(5, "Someone@Example.ie"), bucket(5, "someone@example.ie"));
        let differs = (0..50).any(|i| {
            let email = format!("p{}@x.ie", i);
            bucket(1, &email) != bucket(2, &email)
        });
        assert!(differs);
    }
}
