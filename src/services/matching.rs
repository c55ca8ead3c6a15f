//! Explains why a trip suits a user. The sentence is picked from a fixed
//! set of templates and cached per user, trip and language. The cache is
//! bounded and evicts its oldest entries first.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    It,
    En,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub accessibility_needs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTrip {
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub tutoring_subject: Option<String>,
    #[serde(default)]
    pub assistance_offered: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchRequest {
    pub user: MatchUser,
    pub trip: MatchTrip,
    #[serde(default)]
    pub lang: Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    Assistance,
    SkillMatch,
    Tutoring,
    Emissions,
}

fn classify(user: &MatchUser, trip: &MatchTrip) -> MatchKind {
    if !user.accessibility_needs.is_empty() && trip.assistance_offered {
        return MatchKind::Assistance;
    }
    let Some(subject) = trip
        .tutoring_subject
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    else {
        return MatchKind::Emissions;
    };
    let subject = subject.to_lowercase();
    let skill_match = user
        .skills
        .iter()
        .map(|skill| skill.trim().to_lowercase())
        .any(|skill| !skill.is_empty() && subject.contains(&skill));
    if skill_match {
        MatchKind::SkillMatch
    } else {
        MatchKind::Tutoring
    }
}

pub fn fallback_reason(user: &MatchUser, trip: &MatchTrip, lang: Language) -> String {
    let subject = trip.tutoring_subject.as_deref().unwrap_or_default();
    match (classify(user, trip), lang) {
        (MatchKind::Assistance, Language::It) => "Questo viaggio supporta la Missione 5 del PNRR: il conducente offre l'assistenza specifica di cui hai bisogno per un tragitto inclusivo.".to_string(),
        (MatchKind::Assistance, Language::En) => "This trip supports inclusive mobility: the driver offers the specific assistance you need for the journey.".to_string(),
        (MatchKind::SkillMatch, Language::It) => format!("Match perfetto per la Missione 4! Puoi ripassare {subject} durante il tragitto, ottimizzando il tuo tempo di studio."),
        (MatchKind::SkillMatch, Language::En) => format!("Perfect match! You can review {subject} on the way and make the most of your study time."),
        (MatchKind::Tutoring, Language::It) => format!("Interessante opportunità di Peer Tutoring (Missione 4) in {subject} per ampliare le tue conoscenze durante lo spostamento."),
        (MatchKind::Tutoring, Language::En) => format!("A peer-tutoring opportunity in {subject} to broaden your knowledge while you commute."),
        (MatchKind::Emissions, Language::It) => "Ottima scelta per la Missione 3: riduci le emissioni di CO2 e accumuli crediti per la tua mobilità sostenibile universitaria.".to_string(),
        (MatchKind::Emissions, Language::En) => "Great choice: you cut CO2 emissions and earn credits for sustainable campus mobility.".to_string(),
    }
}

type CacheKey = (String, String, Language);

/// Entries kept before the oldest ones are evicted.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Insertion-ordered map that drops its oldest entry once full.
struct ReasonCache {
    entries: HashMap<CacheKey, String>,
    order: VecDeque<CacheKey>,
    capacity: usize,
}

impl ReasonCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn insert(&mut self, key: CacheKey, reason: String) -> String {
        if let Some(existing) = self.entries.get(&key) {
            return existing.clone();
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, reason.clone());
        reason
    }
}

#[derive(Clone)]
pub struct MatchReasoner {
    cache: Arc<RwLock<ReasonCache>>,
}

impl Default for MatchReasoner {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl MatchReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Arc::new(RwLock::new(ReasonCache::new(capacity))),
        }
    }

    pub async fn reason(&self, request: &MatchRequest) -> String {
        let key = (
            request.user.id.clone(),
            request.trip.id.clone(),
            request.lang,
        );
        if let Some(hit) = self.cache.read().await.entries.get(&key) {
            debug!(user = %key.0, trip = %key.1, "match reason served from cache");
            return hit.clone();
        }

        let reason = fallback_reason(&request.user, &request.trip, request.lang);
        self.cache.write().await.insert(key, reason)
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.entries.len()
    }
}
