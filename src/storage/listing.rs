//! Listing data model.

use serde::{Deserialize, Serialize};

/// A single rental-housing advertisement.
///
/// Immutable once created; the only mutation the store supports is
/// deletion by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    /// Store-assigned unique identifier.
    pub id: String,

    /// Monthly price as entered by the owner (digits only).
    pub price: String,

    /// District within the city.
    pub district: String,

    /// Opaque media reference for the apartment photo.
    pub photo: String,

    /// City the apartment is in, stored as originally submitted.
    pub city: String,

    /// Street address.
    pub address: String,

    /// Telegram user id of the owner.
    pub user_id: i64,
}

/// Accumulated listing fields before the store assigns an id.
///
/// Filled in step by step by the posting form; [`missing_fields`]
/// reports which required keys are still absent.
///
/// [`missing_fields`]: ListingDraft::missing_fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDraft {
    pub price: Option<String>,
    pub district: Option<String>,
    pub photo: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub user_id: Option<i64>,
}

impl ListingDraft {
    /// Returns the names of all required fields that are not yet set.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.price.is_none() {
            missing.push("price");
        }
        if self.district.is_none() {
            missing.push("district");
        }
        if self.photo.is_none() {
            missing.push("photo");
        }
        if self.city.is_none() {
            missing.push("city");
        }
        if self.address.is_none() {
            missing.push("address");
        }
        if self.user_id.is_none() {
            missing.push("user_id");
        }
        missing
    }

    /// Converts the draft into a [`Listing`] with the given id.
    ///
    /// Returns `None` if any required field is still missing; callers
    /// are expected to check [`missing_fields`] first for a proper
    /// error message.
    ///
    /// [`missing_fields`]: ListingDraft::missing_fields
    #[must_use]
    pub fn into_listing(self, id: String) -> Option<Listing> {
        Some(Listing {
            id,
            price: self.price?,
            district: self.district?,
            photo: self.photo?,
            city: self.city?,
            address: self.address?,
            user_id: self.user_id?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_draft() -> ListingDraft {
        ListingDraft {
            price: Some("1000".to_owned()),
            district: Some("Центр".to_owned()),
            photo: Some("p1".to_owned()),
            city: Some("Москва".to_owned()),
            address: Some("ул. 1".to_owned()),
            user_id: Some(42),
        }
    }

    #[test]
    fn test_missing_fields_empty_draft() {
        let draft = ListingDraft::default();
        assert_eq!(
            draft.missing_fields(),
            vec!["price", "district", "photo", "city", "address", "user_id"]
        );
    }

    #[test]
    fn test_missing_fields_partial_draft() {
        let draft = ListingDraft {
            price: Some("1000".to_owned()),
            city: Some("Москва".to_owned()),
            ..ListingDraft::default()
        };
        assert_eq!(
            draft.missing_fields(),
            vec!["district", "photo", "address", "user_id"]
        );
    }

    #[test]
    fn test_into_listing_complete() {
        let listing = full_draft().into_listing("abc".to_owned());
        let listing = listing.unwrap();
        assert_eq!(listing.id, "abc");
        assert_eq!(listing.price, "1000");
        assert_eq!(listing.user_id, 42);
    }

    #[test]
    fn test_into_listing_incomplete() {
        let mut draft = full_draft();
        draft.photo = None;
        assert!(draft.into_listing("abc".to_owned()).is_none());
    }
}
