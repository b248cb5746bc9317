//! Default prompts and the demo inbox.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::DatabaseError;
use crate::pipeline::types::PromptRole;
use crate::store::traits::{Database, NewEmail};

/// Built-in instruction text for each pipeline role.
pub fn default_prompt(role: PromptRole) -> &'static str {
    match role {
        PromptRole::Categorize => {
            "Categorize the following email into one of these categories: 'Work', 'Personal', \
             'Spam', 'Newsletter', 'Urgent'. Return only the category name."
        }
        PromptRole::ExtractActions => {
            "Extract action items from the email. Put concrete things the recipient must do \
             under 'tasks' and optional follow-ups worth considering under 'suggestions'. \
             Use empty lists when there is nothing to do."
        }
        PromptRole::AutoReply => {
            "You are a helpful assistant. Draft a professional and polite reply to this email. \
             If it is a meeting request, ask for an agenda. Keep it concise."
        }
    }
}

/// Insert the default prompt for every role that has none. Edited prompts
/// are left alone. Returns how many were inserted.
pub async fn seed_prompts(db: &dyn Database) -> Result<usize, DatabaseError> {
    let mut inserted = 0;
    for role in PromptRole::ALL {
        if db
            .insert_prompt_if_missing(role.as_str(), default_prompt(role))
            .await?
        {
            inserted += 1;
        }
    }
    if inserted > 0 {
        info!(inserted, "Seeded default prompts");
    }
    Ok(inserted)
}

/// The five-email demo inbox, timestamped relative to `now`.
pub fn mock_inbox(now: DateTime<Utc>) -> Vec<NewEmail> {
    let email = |sender: &str, subject: &str, body: &str, age: Duration| NewEmail {
        sender: sender.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        timestamp: now - age,
    };

    vec![
        email(
            "boss@company.com",
            "Project Deadline Urgent",
            "Hi Nikhita, we need to finish the Q3 report by Friday 5 PM. Please send me the draft before then.",
            Duration::zero(),
        ),
        email(
            "newsletter@techweekly.com",
            "Top 10 AI Tools in 2025",
            "Check out the latest tools in Agentic AI! LangGraph is taking over...",
            Duration::hours(2),
        ),
        email(
            "hr@company.com",
            "Meeting: Performance Review",
            "Hi, I would like to schedule your performance review for next Tuesday at 10 AM. Let me know if that works.",
            Duration::days(1),
        ),
        email(
            "spam@lottery.com",
            "YOU WON $1,000,000!",
            "Click here to claim your prize now! Urgent!",
            Duration::days(2),
        ),
        email(
            "client@bigcorp.com",
            "Contract Revision",
            "Please review the attached contract changes and get back to us by Monday.",
            Duration::hours(5),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    #[tokio::test]
    async fn seed_prompts_only_fills_missing_roles() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.insert_prompt_if_missing("auto_reply", "My own style")
            .await
            .unwrap();

        assert_eq!(seed_prompts(&db).await.unwrap(), 2);
        assert_eq!(seed_prompts(&db).await.unwrap(), 0);

        let reply = db.get_prompt(PromptRole::AutoReply).await.unwrap().unwrap();
        assert_eq!(reply.content, "My own style");
        assert_eq!(db.list_prompts().await.unwrap().len(), 3);
    }

    #[test]
    fn mock_inbox_has_five_emails_newest_first_is_boss() {
        let now = Utc::now();
        let inbox = mock_inbox(now);
        assert_eq!(inbox.len(), 5);

        let newest = inbox.iter().max_by_key(|e| e.timestamp).unwrap();
        assert_eq!(newest.sender, "boss@company.com");
        assert!(inbox.iter().any(|e| e.sender == "spam@lottery.com"));
        assert!(inbox.iter().all(|e| e.timestamp <= now));
    }
}
