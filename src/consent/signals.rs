//! Signal mapper.
//!
//! Translates widget consent categories into Google consent-mode signal keys. The
//! relationship is many signal keys to one category, following the CookieYes mapping:
//! <https://www.cookieyes.com/documentation/implementing-google-consent-mode-using-cookieyes/>

use crate::cookies::ConsentMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::str::FromStr;

/// Consent categories the widget exposes and that have a consent-mode counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentCategory {
    Necessary,
    Functional,
    Analytics,
    Advertisement,
}

impl ConsentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentCategory::Necessary => "necessary",
            ConsentCategory::Functional => "functional",
            ConsentCategory::Analytics => "analytics",
            ConsentCategory::Advertisement => "advertisement",
        }
    }
}

impl FromStr for ConsentCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "necessary" => Ok(ConsentCategory::Necessary),
            "functional" => Ok(ConsentCategory::Functional),
            "analytics" => Ok(ConsentCategory::Analytics),
            "advertisement" => Ok(ConsentCategory::Advertisement),
            _ => Err(()),
        }
    }
}

impl Display for ConsentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Consent-mode signal keys, declared in the order they are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKey {
    AdStorage,
    AdUserData,
    AdPersonalization,
    AnalyticsStorage,
    FunctionalityStorage,
    PersonalizationStorage,
    SecurityStorage,
}

impl SignalKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKey::AdStorage => "ad_storage",
            SignalKey::AdUserData => "ad_user_data",
            SignalKey::AdPersonalization => "ad_personalization",
            SignalKey::AnalyticsStorage => "analytics_storage",
            SignalKey::FunctionalityStorage => "functionality_storage",
            SignalKey::PersonalizationStorage => "personalization_storage",
            SignalKey::SecurityStorage => "security_storage",
        }
    }
}

impl Display for SignalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static signal key to category table.
pub const SIGNAL_MAPPING: [(SignalKey, ConsentCategory); 7] = [
    (SignalKey::AdStorage, ConsentCategory::Advertisement),
    (SignalKey::AdUserData, ConsentCategory::Advertisement),
    (SignalKey::AdPersonalization, ConsentCategory::Advertisement),
    (SignalKey::AnalyticsStorage, ConsentCategory::Analytics),
    (SignalKey::FunctionalityStorage, ConsentCategory::Functional),
    (SignalKey::PersonalizationStorage, ConsentCategory::Functional),
    (SignalKey::SecurityStorage, ConsentCategory::Necessary),
];

lazy_static! {
    /// Reverse index of [`SIGNAL_MAPPING`].
    static ref CATEGORY_SIGNALS: HashMap<ConsentCategory, Vec<SignalKey>> = {
        let mut index: HashMap<ConsentCategory, Vec<SignalKey>> = HashMap::new();
        for (key, category) in SIGNAL_MAPPING {
            index.entry(category).or_default().push(key);
        }
        index
    };
}

/// Signal keys fed by `category`, in table order.
pub fn signal_keys_for(category: ConsentCategory) -> &'static [SignalKey] {
    CATEGORY_SIGNALS.get(&category).map(Vec::as_slice).unwrap_or(&[])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Granted,
    Denied,
}

impl Decision {
    /// `"yes"` grants, any other value denies.
    pub fn from_widget_value(value: &str) -> Self {
        if value == "yes" {
            Decision::Granted
        } else {
            Decision::Denied
        }
    }
}

/// Signal key to decision map, sent to the consent API in one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalBatch(BTreeMap<SignalKey, Decision>);

impl SignalBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// The declaration sent before any cookie is read: everything denied except
    /// security storage.
    pub fn default_declaration() -> Self {
        SIGNAL_MAPPING
            .iter()
            .map(|(key, _)| match key {
                SignalKey::SecurityStorage => (*key, Decision::Granted),
                _ => (*key, Decision::Denied),
            })
            .collect()
    }

    pub fn insert(&mut self, key: SignalKey, decision: Decision) {
        self.0.insert(key, decision);
    }

    pub fn get(&self, key: SignalKey) -> Option<Decision> {
        self.0.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalKey, Decision)> + '_ {
        self.0.iter().map(|(k, d)| (*k, *d))
    }
}

impl FromIterator<(SignalKey, Decision)> for SignalBatch {
    fn from_iter<I: IntoIterator<Item = (SignalKey, Decision)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Adds the signals for one `(category, value)` pair to `batch`. Unknown categories and
/// undefined values add nothing.
pub fn map_category(batch: &mut SignalBatch, category: &str, value: Option<&str>) {
    let (Ok(category), Some(value)) = (category.parse::<ConsentCategory>(), value) else {
        return;
    };

    let decision = Decision::from_widget_value(value);
    for key in signal_keys_for(category) {
        batch.insert(*key, decision);
    }
}

/// Maps every category decision in `decisions` to its signal keys.
pub fn map_to_signals(decisions: &ConsentMap) -> SignalBatch {
    let mut batch = SignalBatch::new();
    for (category, value) in decisions.iter() {
        map_category(&mut batch, category, value);
    }
    batch
}
