//! The recommendation agent.
//!
//! One tool round at most: the model either answers directly
//! (conversational), refuses with the blocked marker, or calls the search
//! tool. A search compiles the extracted dates into a metadata filter, runs
//! retrieval, grounds the hits in the item catalog, and feeds the result back
//! for the final reply.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use giro_core::{
    error::GiroError,
    filter::{compile, DateQuery, TimePreference},
    message::{Answer, ChatKind, ContextEntry, Outcome, Role},
    traits::{Reasoner, Retriever},
};
use giro_memory::{Item, Store};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::openai::{ChatClient, ChatMessage, FunctionDef, Tool};
use crate::prompts::{BLOCKED_MARKER, RECOMMEND_SYSTEM};

/// Arguments the model passes to the search tool.
#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    #[serde(default)]
    time_of_day: TimePreference,
}

pub struct RecommendAgent {
    client: ChatClient,
    retriever: Arc<dyn Retriever>,
    store: Store,
    top_k: usize,
    lookahead_days: i64,
}

impl RecommendAgent {
    pub fn new(
        client: ChatClient,
        retriever: Arc<dyn Retriever>,
        store: Store,
        top_k: usize,
        lookahead_days: i64,
    ) -> Self {
        Self {
            client,
            retriever,
            store,
            top_k,
            lookahead_days,
        }
    }

    fn search_tool() -> Tool {
        Tool {
            kind: "function",
            function: FunctionDef {
                name: "search_items",
                description: "Search the catalog of events and venues in Turin. \
                    Dates are YYYY-MM-DD; omit them when the user named none.",
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "What the user is looking for, in their words"
                        },
                        "start_date": {
                            "type": "string",
                            "description": "First acceptable date, YYYY-MM-DD"
                        },
                        "end_date": {
                            "type": "string",
                            "description": "Last acceptable date, YYYY-MM-DD"
                        },
                        "time_of_day": {
                            "type": "string",
                            "enum": ["daytime", "nighttime", "entire_day"],
                            "description": "Only when the user stated a preference"
                        }
                    },
                    "required": ["query"]
                }),
            },
        }
    }

    fn system_message(today: NaiveDate) -> ChatMessage {
        let weekday = match today.weekday() {
            chrono::Weekday::Mon => "Monday",
            chrono::Weekday::Tue => "Tuesday",
            chrono::Weekday::Wed => "Wednesday",
            chrono::Weekday::Thu => "Thursday",
            chrono::Weekday::Fri => "Friday",
            chrono::Weekday::Sat => "Saturday",
            chrono::Weekday::Sun => "Sunday",
        };
        ChatMessage::system(
            RECOMMEND_SYSTEM
                .replace("{today}", &today.format("%Y-%m-%d").to_string())
                .replace("{weekday}", weekday),
        )
    }

    /// Run the search tool: compile the filter, retrieve, ground in the
    /// catalog. Returns the item ids and the text handed back to the model.
    async fn run_search(&self, args: &SearchArgs, today: NaiveDate) -> Result<(Vec<i64>, String), GiroError> {
        let query = DateQuery {
            start: args.start_date,
            end: args.end_date,
            time: args.time_of_day,
        };
        let filter = compile(&query, today, self.lookahead_days);
        debug!("search '{}' filter={:?}", args.query, filter);

        let hits = self
            .retriever
            .search(&args.query, &filter, self.top_k)
            .await?;
        let ids: Vec<i64> = hits.iter().map(|h| h.item_id).collect();

        // Every hit must exist in the catalog; a gap fails the turn.
        let items = self.store.get_items(&ids).await?;
        Ok((ids, render_items(&items)))
    }
}

/// The tool-result text the model grounds its reply in.
fn render_items(items: &[Item]) -> String {
    if items.is_empty() {
        return "No matching items found.".to_string();
    }
    let mut out = String::new();
    for item in items {
        out.push_str(&format!(
            "- {} | {} | {} to {} | {}\n  {}\n",
            item.name,
            item.location,
            item.start_date.format("%Y-%m-%d"),
            item.end_date.format("%Y-%m-%d"),
            item.url,
            item.description,
        ));
    }
    out
}

/// Classify final content: the blocked marker wins over everything else.
fn classify(content: &str, searched: bool) -> (String, Outcome) {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix(BLOCKED_MARKER) {
        return (rest.trim().to_string(), Outcome::Blocked);
    }
    let outcome = if searched {
        Outcome::Ai
    } else {
        Outcome::Conversational
    };
    (trimmed.to_string(), outcome)
}

#[async_trait]
impl Reasoner for RecommendAgent {
    fn name(&self) -> &str {
        "recommend"
    }

    async fn answer(
        &self,
        _kind: ChatKind,
        context: &[ContextEntry],
        text: &str,
    ) -> Result<Answer, GiroError> {
        let today = Utc::now().date_naive();
        let mut messages = vec![Self::system_message(today)];
        for entry in context {
            messages.push(match entry.role {
                Role::Human => ChatMessage::user(entry.text.clone()),
                Role::Assistant => ChatMessage::assistant(entry.text.clone()),
            });
        }
        messages.push(ChatMessage::user(text));

        let tools = [Self::search_tool()];
        let first = self.client.chat(&messages, Some(&tools)).await?;

        let mut item_ids = Vec::new();
        let mut searched = false;
        let final_content = match &first.tool_calls {
            Some(calls) if !calls.is_empty() => {
                messages.push(first.clone());
                for call in calls {
                    if call.function.name != "search_items" {
                        warn!("model called unknown tool '{}'", call.function.name);
                        messages.push(ChatMessage::tool_result(
                            call.id.clone(),
                            "Unknown tool.",
                        ));
                        continue;
                    }
                    let args: SearchArgs =
                        serde_json::from_str(&call.function.arguments).map_err(|e| {
                            GiroError::Agent(format!("bad search_items arguments: {e}"))
                        })?;
                    let (ids, rendered) = self.run_search(&args, today).await?;
                    searched = true;
                    item_ids.extend(ids);
                    messages.push(ChatMessage::tool_result(call.id.clone(), rendered));
                }

                let second = self.client.chat(&messages, None).await?;
                second
                    .content
                    .ok_or_else(|| GiroError::Agent("empty reply after search".to_string()))?
            }
            _ => first
                .content
                .ok_or_else(|| GiroError::Agent("empty reply".to_string()))?,
        };

        // Searched means the tool ran, whether or not it found anything: a
        // zero-hit reply still spent the retrieval budget.
        let (reply, outcome) = classify(&final_content, searched);
        info!("recommend turn classified as {}", outcome.as_str());

        Ok(Answer {
            text: Some(reply),
            outcome,
            item_ids,
        })
    }
}
