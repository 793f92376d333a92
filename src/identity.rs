//! Identity pool module
//! Synthesizes a stable set of enterprise user identities with cross-run persistence

use chrono::Utc;
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Maximum uniqueness retries before forcing a numeric-suffix fallback
const MAX_UNIQUE_ATTEMPTS: usize = 100;

/// Cache file schema version
const CACHE_VERSION: &str = "1.0";

/// A single simulated enterprise user.
///
/// Immutable after generation except for `ip_address`, which the session
/// driver assigns from the internal subnets at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub locale: String,
    pub full_name: String,
    pub ip_address: Option<Ipv4Addr>,
}

impl Identity {
    fn new(first: &str, last: &str, username: String, domain: &str, locale: &str) -> Self {
        Self {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!("{}@{}", username, domain),
            username,
            locale: locale.to_string(),
            full_name: format!("{} {}", first, last),
            ip_address: None,
        }
    }
}

/// Persistent username cache written at the end of each generation run.
#[derive(Debug, Serialize, Deserialize)]
struct IdentityCache {
    usernames: Vec<String>,
    generated_at: String,
    version: String,
}

/// Per-locale name source with its share of the generated population.
struct LocaleNames {
    name: &'static str,
    weight: f64,
    first_names: &'static [&'static str],
    last_names: &'static [&'static str],
}

/// Weighted locale table; weights sum to 1.0.
const LOCALES: &[LocaleNames] = &[
    LocaleNames {
        name: "US",
        weight: 0.30,
        first_names: &[
            "James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael", "Linda",
            "David", "Elizabeth", "William", "Sarah", "Richard", "Karen", "Thomas", "Ashley",
        ],
        last_names: &[
            "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis",
            "Wilson", "Anderson", "Taylor", "Moore", "Jackson", "Martin", "Lee", "Thompson",
        ],
    },
    LocaleNames {
        name: "India",
        weight: 0.15,
        first_names: &[
            "Aarav", "Priya", "Rahul", "Ananya", "Arjun", "Divya", "Vikram", "Sneha",
            "Rohan", "Kavya", "Aditya", "Meera",
        ],
        last_names: &[
            "Sharma", "Patel", "Kumar", "Singh", "Gupta", "Reddy", "Iyer", "Nair",
            "Mehta", "Joshi", "Rao", "Verma",
        ],
    },
    LocaleNames {
        name: "UK",
        weight: 0.10,
        first_names: &[
            "Oliver", "Amelia", "George", "Isla", "Harry", "Olivia", "Jack", "Emily",
            "Charlie", "Sophie", "Oscar", "Grace",
        ],
        last_names: &[
            "Walker", "Wright", "Robinson", "Clarke", "Hall", "Green", "Wood", "Harris",
            "Lewis", "Turner", "Hill", "Cooper",
        ],
    },
    LocaleNames {
        name: "Germany",
        weight: 0.08,
        first_names: &[
            "Lukas", "Anna", "Felix", "Lena", "Jonas", "Hannah", "Maximilian", "Laura",
            "Paul", "Julia", "Jürgen", "Sören",
        ],
        last_names: &[
            "Müller", "Schmidt", "Schneider", "Fischer", "Weber", "Meyer", "Wagner",
            "Becker", "Schulz", "Hoffmann", "Köhler", "Schäfer",
        ],
    },
    LocaleNames {
        name: "France",
        weight: 0.07,
        first_names: &[
            "Lucas", "Emma", "Hugo", "Léa", "Louis", "Chloé", "Jules", "Manon",
            "Gabriel", "Camille", "François", "Amélie",
        ],
        last_names: &[
            "Martin", "Bernard", "Dubois", "Thomas", "Robert", "Petit", "Durand",
            "Leroy", "Moreau", "Lefèvre", "Roux", "Fournier",
        ],
    },
    LocaleNames {
        name: "Spain",
        weight: 0.05,
        first_names: &[
            "Alejandro", "Lucía", "Pablo", "María", "Daniel", "Carmen", "Javier",
            "Sofía", "Diego", "Elena", "José", "Inés",
        ],
        last_names: &[
            "García", "Rodríguez", "Martínez", "López", "Sánchez", "Pérez", "Gómez",
            "Fernández", "Díaz", "Torres", "Ruiz", "Núñez",
        ],
    },
    LocaleNames {
        name: "Italy",
        weight: 0.05,
        first_names: &[
            "Francesco", "Giulia", "Alessandro", "Sofia", "Lorenzo", "Aurora", "Matteo",
            "Martina", "Leonardo", "Chiara", "Niccolò", "Alessia",
        ],
        last_names: &[
            "Rossi", "Russo", "Ferrari", "Esposito", "Bianchi", "Romano", "Colombo",
            "Ricci", "Marino", "Greco", "Bruno", "Gallo",
        ],
    },
    LocaleNames {
        name: "Japan",
        weight: 0.05,
        first_names: &[
            "Haruto", "Yui", "Sota", "Aoi", "Yuto", "Hina", "Ren", "Sakura",
            "Kaito", "Mio", "Riku", "Akari",
        ],
        last_names: &[
            "Sato", "Suzuki", "Takahashi", "Tanaka", "Watanabe", "Ito", "Yamamoto",
            "Nakamura", "Kobayashi", "Kato", "Yoshida", "Yamada",
        ],
    },
    LocaleNames {
        name: "China",
        weight: 0.05,
        first_names: &[
            "Wei", "Fang", "Jun", "Xiu", "Ming", "Li", "Hao", "Yan",
            "Lei", "Jing", "Qiang", "Mei",
        ],
        last_names: &[
            "Wang", "Li", "Zhang", "Liu", "Chen", "Yang", "Huang", "Zhao",
            "Wu", "Zhou", "Xu", "Sun",
        ],
    },
    LocaleNames {
        name: "Brazil",
        weight: 0.05,
        first_names: &[
            "Miguel", "Alice", "Arthur", "Sophia", "Heitor", "Helena", "Bernardo",
            "Valentina", "Davi", "Laura", "João", "Luíza",
        ],
        last_names: &[
            "Silva", "Santos", "Oliveira", "Souza", "Rodrigues", "Ferreira", "Alves",
            "Pereira", "Lima", "Gomes", "Ribeiro", "Araújo",
        ],
    },
    LocaleNames {
        name: "Canada",
        weight: 0.05,
        first_names: &[
            "Liam", "Emma", "Noah", "Olivia", "William", "Ava", "Benjamin", "Charlotte",
            "Logan", "Chloe", "Ethan", "Abigail",
        ],
        last_names: &[
            "Tremblay", "Roy", "Gagnon", "Côté", "Bouchard", "Morin", "Lavoie",
            "Fortin", "Gauthier", "Bergeron", "MacDonald", "Campbell",
        ],
    },
];

/// System account usernames that are always generated first.
const SYSTEM_USERNAMES: [&str; 3] = ["admin", "service.account", "noreply"];

/// Generates and persists enterprise user identities.
pub struct IdentityPool {
    domain: String,
    cache_file: Option<PathBuf>,
    rng: StdRng,
}

impl IdentityPool {
    /// Create a pool for the given enterprise domain.
    ///
    /// A seed makes generation reproducible; without one the pool seeds
    /// itself from entropy.
    pub fn new(domain: &str, cache_file: Option<PathBuf>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            domain: domain.to_string(),
            cache_file,
            rng,
        }
    }

    /// Generate `count` identities: system accounts, then cached replays,
    /// then freshly synthesized users. All usernames (old and new) are
    /// persisted back to the cache.
    pub fn generate(&mut self, count: usize) -> anyhow::Result<Vec<Identity>> {
        let mut identities = Vec::with_capacity(count);
        let mut seen_emails: HashSet<String> = HashSet::new();

        for identity in self.system_identities() {
            if identities.len() >= count {
                break;
            }
            seen_emails.insert(identity.email.clone());
            identities.push(identity);
        }

        // Replay previously cached usernames before synthesizing new ones
        for username in self.load_cache() {
            if identities.len() >= count {
                break;
            }
            if SYSTEM_USERNAMES.contains(&username.as_str()) {
                continue;
            }
            let identity = self.identity_from_cached_username(&username);
            if seen_emails.insert(identity.email.clone()) {
                identities.push(identity);
            }
        }

        while identities.len() < count {
            let identity = self.synthesize_identity(&mut seen_emails);
            identities.push(identity);
        }

        self.save_cache(&identities)?;

        Ok(identities)
    }

    /// The three fixed system identities, in fixed order.
    fn system_identities(&self) -> Vec<Identity> {
        vec![
            Identity::new("Admin", "User", "admin".to_string(), &self.domain, "System"),
            Identity::new(
                "Service",
                "Account",
                "service.account".to_string(),
                &self.domain,
                "System",
            ),
            Identity::new("No", "Reply", "noreply".to_string(), &self.domain, "System"),
        ]
    }

    /// Rebuild display fields from a cached username. The original name
    /// parts are gone, so the locale is marked "cached".
    fn identity_from_cached_username(&self, username: &str) -> Identity {
        let (first, last) = match username.split_once('.') {
            Some((first, rest)) => (capitalize(first), capitalize(rest)),
            None => (capitalize(username), "User".to_string()),
        };

        Identity {
            email: format!("{}@{}", username, self.domain),
            username: username.to_string(),
            full_name: format!("{} {}", first, last),
            first_name: first,
            last_name: last,
            locale: "cached".to_string(),
            ip_address: None,
        }
    }

    /// Synthesize one new identity with a unique email.
    fn synthesize_identity(&mut self, seen_emails: &mut HashSet<String>) -> Identity {
        let mut fallback: Option<(String, String, &'static str, String)> = None;

        for attempt in 0..MAX_UNIQUE_ATTEMPTS {
            let locale = self.select_locale();
            let first = *locale
                .first_names
                .choose(&mut self.rng)
                .unwrap_or(&locale.first_names[0]);
            let last = *locale
                .last_names
                .choose(&mut self.rng)
                .unwrap_or(&locale.last_names[0]);

            let first_norm = normalize_name(first);
            let last_norm = normalize_name(last);

            // Occasional middle initial, more likely once collisions start
            let local = if attempt > 0 || self.rng.gen_bool(0.1) {
                let initial = (b'a' + self.rng.gen_range(0..26)) as char;
                format!("{}.{}.{}", first_norm, initial, last_norm)
            } else {
                format!("{}.{}", first_norm, last_norm)
            };

            if fallback.is_none() {
                fallback = Some((
                    first.to_string(),
                    last.to_string(),
                    locale.name,
                    format!("{}.{}", first_norm, last_norm),
                ));
            }

            let email = format!("{}@{}", local, self.domain);
            if seen_emails.insert(email) {
                return Identity::new(first, last, local, &self.domain, locale.name);
            }

            // Numeric suffix variant before burning another attempt
            let suffixed = format!("{}{}", local, self.rng.gen_range(1..100));
            let email = format!("{}@{}", suffixed, self.domain);
            if seen_emails.insert(email) {
                return Identity::new(first, last, suffixed, &self.domain, locale.name);
            }
        }

        // Retries exhausted: force a wide numeric suffix. Never fails.
        let (first, last, locale, base) = match fallback {
            Some(parts) => parts,
            None => {
                let locale = &LOCALES[0];
                let first = locale.first_names[0];
                let last = locale.last_names[0];
                let base = format!("{}.{}", normalize_name(first), normalize_name(last));
                (first.to_string(), last.to_string(), locale.name, base)
            }
        };
        loop {
            let local = format!("{}{}", base, self.rng.gen_range(1000..10000));
            let email = format!("{}@{}", local, self.domain);
            if seen_emails.insert(email) {
                return Identity::new(&first, &last, local, &self.domain, locale);
            }
        }
    }

    /// Pick a locale from the fixed categorical weight table.
    fn select_locale(&mut self) -> &'static LocaleNames {
        let total: f64 = LOCALES.iter().map(|l| l.weight).sum();
        let mut remaining = self.rng.gen::<f64>() * total;

        for locale in LOCALES {
            if remaining <= locale.weight {
                return locale;
            }
            remaining -= locale.weight;
        }

        &LOCALES[0]
    }

    /// Load cached usernames; a missing or corrupt cache is an empty cache.
    fn load_cache(&self) -> Vec<String> {
        let Some(path) = &self.cache_file else {
            return Vec::new();
        };

        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<IdentityCache>(&raw) {
                Ok(cache) => cache.usernames,
                Err(e) => {
                    info!("Ignoring corrupt identity cache {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        }
    }

    /// Persist every username from this run back to the cache file.
    fn save_cache(&self, identities: &[Identity]) -> anyhow::Result<()> {
        let Some(path) = &self.cache_file else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let cache = IdentityCache {
            usernames: identities.iter().map(|i| i.username.clone()).collect(),
            generated_at: Utc::now().to_rfc3339(),
            version: CACHE_VERSION.to_string(),
        };

        std::fs::write(path, serde_json::to_string_pretty(&cache)?)?;
        Ok(())
    }
}

/// Normalize a display name into email local-part form: fold accents to
/// ASCII, lowercase, and keep only alphanumerics plus `-`/`_`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => out.push('a'),
            'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => out.push('e'),
            'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => out.push('i'),
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ø' => out.push('o'),
            'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => out.push('u'),
            'ý' | 'ÿ' | 'Ý' => out.push('y'),
            'ñ' | 'Ñ' => out.push('n'),
            'ç' | 'Ç' => out.push('c'),
            'ß' => out.push_str("ss"),
            'æ' | 'Æ' => out.push_str("ae"),
            'œ' | 'Œ' => out.push_str("oe"),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => {
                out.push(c.to_ascii_lowercase())
            }
            _ => {}
        }
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
