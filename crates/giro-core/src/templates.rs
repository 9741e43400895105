//! Canned user-visible messages.
//!
//! Defaults are hardcoded; a `TEMPLATES.toml` in the data dir overrides any
//! subset of them so wording can change without a rebuild.

use serde::Deserialize;
use std::collections::HashMap;

use crate::config::shellexpand;

/// Templated replies for every handled short-circuit in the journey.
#[derive(Debug, Clone)]
pub struct Templates {
    /// First contact on the recommendation chat.
    pub welcome: String,
    /// First contact on the business registration chat.
    pub business_welcome: String,
    /// First contact while the identity population is at capacity.
    pub capacity_reached: String,
    /// Weekly answered-turn limit hit. Placeholders: `{limit}`, `{until}`.
    pub weekly_answer_limit: String,
    /// Weekly invalid-query limit hit. Placeholders: `{limit}`, `{until}`.
    pub weekly_block_limit: String,
    /// A block expired and this message triggered the unblock.
    pub unblocked: String,
    /// The message sat in the gateway too long to be worth answering.
    pub not_delivered: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            welcome: "Ciao! Sono *Giro* \u{1f30d} \u{2014} dimmi che voglia hai \
                      (un concerto, un aperitivo, una mostra...) e quando, e ti \
                      propongo qualcosa in citt\u{00e0}."
                .into(),
            business_welcome: "Benvenuto su *Giro* per le attivit\u{00e0}! Raccontami del tuo \
                               locale o del tuo evento e ti guido nella registrazione."
                .into(),
            capacity_reached: "Grazie per l'interesse! Al momento abbiamo raggiunto il numero \
                               massimo di utenti \u{2014} riprova tra qualche settimana."
                .into(),
            weekly_answer_limit: "Hai raggiunto il limite di {limit} ricerche a settimana. \
                                  Potrai riprovare dal {until}."
                .into(),
            weekly_block_limit: "Troppe richieste fuori tema questa settimana (limite {limit}). \
                                 Potrai riprovare dal {until}."
                .into(),
            unblocked: "Bentornato! Il blocco \u{00e8} scaduto, puoi ricominciare a chiedere."
                .into(),
            not_delivered: "Scusa, il tuo messaggio ci \u{00e8} arrivato in ritardo e non \
                            siamo riusciti a risponderti in tempo. Riprova ora!"
                .into(),
        }
    }
}

/// TOML structure for `TEMPLATES.toml`.
#[derive(Deserialize)]
struct TemplatesFile {
    messages: HashMap<String, String>,
}

impl Templates {
    /// Load templates from `TEMPLATES.toml` in `data_dir`, keeping defaults
    /// for any key the file does not set.
    pub fn load(data_dir: &str) -> Self {
        let mut templates = Self::default();
        let path = format!("{}/TEMPLATES.toml", shellexpand(data_dir));

        if let Ok(content) = std::fs::read_to_string(&path) {
            match toml::from_str::<TemplatesFile>(&content) {
                Ok(file) => {
                    for (key, value) in file.messages {
                        match key.as_str() {
                            "welcome" => templates.welcome = value,
                            "business_welcome" => templates.business_welcome = value,
                            "capacity_reached" => templates.capacity_reached = value,
                            "weekly_answer_limit" => templates.weekly_answer_limit = value,
                            "weekly_block_limit" => templates.weekly_block_limit = value,
                            "unblocked" => templates.unblocked = value,
                            "not_delivered" => templates.not_delivered = value,
                            other => tracing::warn!("templates: unknown key '{other}' in {path}"),
                        }
                    }
                    tracing::info!("loaded templates from {path}");
                }
                Err(e) => {
                    tracing::warn!("failed to parse {path}: {e}");
                }
            }
        }

        templates
    }

    /// Fill the `{limit}` / `{until}` placeholders of a weekly-limit template.
    pub fn render_limit(template: &str, limit: i64, until: &str) -> String {
        template
            .replace("{limit}", &limit.to_string())
            .replace("{until}", until)
    }
}
