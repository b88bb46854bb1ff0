//! Reply-labeling pipeline: predict a sentiment per scraped reply, then
//! collapse repetitions into one labeled row per distinct tweet.
//!
//! Reply corpora are CSV with the column set `label,tweet,id,user,reply`.
//! Column order is free, extra columns are ignored, and `label`/`user` may
//! be absent in raw scrapes. Fields may contain commas and quotes, and
//! quoted fields in scraped files may span multiple lines; the writer
//! flattens newlines to spaces.

use crate::config::ReplySource;
use crate::data::{DataProvider, Mode, Tokenizer};
use crate::error::{LabError, Result};
use crate::inference::predict::{Predictor, predict_phrase, restore_best};
use crate::registry::Experiment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// One row of a reply corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRecord {
    /// Predicted sentiment; `None` until the pipeline fills it in.
    pub label: Option<String>,
    /// Text of the tweet the reply answers.
    pub tweet: String,
    /// Id of the answered tweet; repeats across its replies.
    pub id: String,
    pub user: String,
    pub reply: String,
}

/// One row of the summarized output: a tweet with its majority label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledTweet {
    pub label: String,
    pub tweet: String,
}

/// Totals of one labeling run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyLabelReport {
    pub replies_labeled: usize,
    pub tweets_written: usize,
    pub elapsed_secs: f64,
}

/// Read a reply corpus, locating columns by header name.
pub fn read_reply_csv(path: &Path) -> Result<Vec<ReplyRecord>> {
    let content = std::fs::read_to_string(path)?;
    let mut rows = parse_csv_records(&content)
        .map_err(|_| {
            LabError::dataset(format!("{} has an unterminated quoted field", path.display()))
        })?
        .into_iter();
    let columns = rows
        .next()
        .ok_or_else(|| LabError::dataset(format!("{} is empty", path.display())))?;
    let find = |name: &str| {
        columns
            .iter()
            .position(|column| column.trim().eq_ignore_ascii_case(name))
    };
    let missing = |name: &str| {
        LabError::dataset(format!("{} has no '{name}' column", path.display()))
    };

    let label_idx = find("label");
    let tweet_idx = find("tweet").ok_or_else(|| missing("tweet"))?;
    let id_idx = find("id").ok_or_else(|| missing("id"))?;
    let user_idx = find("user");
    let reply_idx = find("reply").ok_or_else(|| missing("reply"))?;

    let mut records = Vec::new();
    for fields in rows {
        let get = |idx: usize| fields.get(idx).cloned().unwrap_or_default();
        records.push(ReplyRecord {
            label: label_idx.map(|i| get(i)).filter(|value| !value.is_empty()),
            tweet: get(tweet_idx),
            id: get(id_idx),
            user: user_idx.map(|i| get(i)).unwrap_or_default(),
            reply: get(reply_idx),
        });
    }
    Ok(records)
}

/// Write a reply corpus in canonical column order.
pub fn write_reply_csv(path: &Path, records: &[ReplyRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = String::from("label,tweet,id,user,reply\n");
    for record in records {
        let row = [
            record.label.as_deref().unwrap_or(""),
            record.tweet.as_str(),
            record.id.as_str(),
            record.user.as_str(),
            record.reply.as_str(),
        ]
        .map(escape_csv_field)
        .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

fn write_summary_csv(path: &Path, tweets: &[LabeledTweet]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = String::from("label,tweet\n");
    for tweet in tweets {
        out.push_str(&escape_csv_field(&tweet.label));
        out.push(',');
        out.push_str(&escape_csv_field(&tweet.tweet));
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

/// Split CSV content into records, honoring `"` quoting and `""` escapes.
///
/// A newline inside a quoted field belongs to the field, so records may
/// span lines. Blank lines are skipped. A quote still open at end of input
/// is a dataset error rather than a truncated record.
fn parse_csv_records(content: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
                if fields.len() == 1 && fields[0].trim().is_empty() {
                    fields.clear();
                } else {
                    records.push(std::mem::take(&mut fields));
                }
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(LabError::dataset("unterminated quoted field"));
    }
    if !fields.is_empty() || !current.trim().is_empty() {
        fields.push(current);
        records.push(fields);
    }
    Ok(records)
}

fn escape_csv_field(field: &str) -> String {
    let cleaned = field.replace(['\r', '\n'], " ");
    if cleaned.contains(',') || cleaned.contains('"') {
        format!("\"{}\"", cleaned.replace('"', "\"\""))
    } else {
        cleaned
    }
}

/// Collapse labeled replies into one row per distinct tweet id.
///
/// Each tweet gets the majority label among its replies; ties go to the
/// label seen first. First-appearance order of ids is preserved. Records
/// without a label are skipped.
pub fn summarize(records: &[ReplyRecord]) -> Vec<LabeledTweet> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_id: HashMap<&str, (&str, Vec<(&str, usize)>)> = HashMap::new();

    for record in records {
        let Some(label) = record.label.as_deref() else {
            continue;
        };
        let entry = by_id.entry(&record.id).or_insert_with(|| {
            order.push(&record.id);
            (record.tweet.as_str(), Vec::new())
        });
        match entry.1.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => entry.1.push((label, 1)),
        }
    }

    order
        .iter()
        .filter_map(|id| {
            let (tweet, counts) = by_id.get(id)?;
            let mut best: Option<(&str, usize)> = None;
            for &(label, count) in counts {
                if best.is_none_or(|(_, top)| count > top) {
                    best = Some((label, count));
                }
            }
            best.map(|(label, _)| LabeledTweet {
                label: label.to_string(),
                tweet: tweet.to_string(),
            })
        })
        .collect()
}

/// Label every reply of a corpus, then summarize per tweet.
///
/// Reads the raw file of `source`, predicts a label per reply with the
/// experiment's best checkpoint, writes the labeled corpus, and finally the
/// per-tweet summary. Any prediction failure aborts the run unchanged.
pub fn label_replies(
    experiment: &Experiment,
    provider: &dyn DataProvider,
    predictor: &mut dyn Predictor,
    tokenizer: &dyn Tokenizer,
    source: ReplySource,
) -> Result<ReplyLabelReport> {
    let started = Instant::now();
    let files = experiment.config.artifacts.reply_files(source).clone();
    let mut records = read_reply_csv(&files.raw)?;
    let context = provider
        .load(&experiment.config, Mode::ReplyPredict)?
        .into_predict()?;
    restore_best(experiment, predictor)?;

    for record in &mut records {
        let predicted = predict_phrase(&*predictor, tokenizer, &context, &record.reply)?;
        record.label = Some(predicted.label);
    }
    write_reply_csv(&files.labeled, &records)?;

    let tweets = summarize(&records);
    write_summary_csv(&files.summarized, &tweets)?;

    let report = ReplyLabelReport {
        replies_labeled: records.len(),
        tweets_written: tweets.len(),
        elapsed_secs: started.elapsed().as_secs_f64(),
    };
    info!(
        name = %experiment.config.name,
        source = ?source,
        replies = report.replies_labeled,
        tweets = report.tweets_written,
        "reply labeling complete",
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(label: Option<&str>, id: &str, tweet: &str, reply: &str) -> ReplyRecord {
        ReplyRecord {
            label: label.map(str::to_string),
            tweet: tweet.to_string(),
            id: id.to_string(),
            user: "someone".to_string(),
            reply: reply.to_string(),
        }
    }

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_parse_csv_records_handles_quoting() {
        let content = "a,b,c\nplain,\"with, comma\",\"say \"\"hi\"\"\"\none,,three\n";
        assert_eq!(
            parse_csv_records(content).unwrap(),
            vec![
                row(&["a", "b", "c"]),
                row(&["plain", "with, comma", r#"say "hi""#]),
                row(&["one", "", "three"]),
            ],
        );
    }

    #[test]
    fn test_parse_csv_records_spans_quoted_newlines() {
        let records = parse_csv_records("a,\"x\ny\",b\nc,d,e\n").unwrap();
        assert_eq!(records, vec![row(&["a", "x\ny", "b"]), row(&["c", "d", "e"])]);
    }

    #[test]
    fn test_parse_csv_records_skips_blank_lines() {
        let records = parse_csv_records("a,b\n\n  \nc,d").unwrap();
        assert_eq!(records, vec![row(&["a", "b"]), row(&["c", "d"])]);
    }

    #[test]
    fn test_parse_csv_records_rejects_unterminated_quote() {
        assert!(matches!(
            parse_csv_records("a,\"left open\n"),
            Err(LabError::Dataset(_)),
        ));
    }

    #[test]
    fn test_roundtrip_with_awkward_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replies.csv");
        let records = vec![
            record(Some("positive"), "42", "great, isn't it?", r#"yes "very""#),
            record(None, "43", "meh", "line\nbreak"),
        ];
        write_reply_csv(&path, &records).unwrap();

        let loaded = read_reply_csv(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], records[0]);
        // Newlines are flattened to spaces on write.
        assert_eq!(loaded[1].reply, "line break");
        assert_eq!(loaded[1].label, None);
    }

    #[test]
    fn test_read_locates_columns_by_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scrape.csv");
        // Raw scrapes lack the label column and order columns differently.
        std::fs::write(&path, "id,reply,tweet,extra\n7,nice one,hello world,x\n").unwrap();

        let records = read_reply_csv(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "7");
        assert_eq!(records[0].reply, "nice one");
        assert_eq!(records[0].tweet, "hello world");
        assert_eq!(records[0].label, None);
        assert_eq!(records[0].user, "");
    }

    #[test]
    fn test_read_raw_scrape_with_quoted_newline_reply() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scrape.csv");
        // Scraped replies keep their line breaks inside quoted fields.
        std::fs::write(
            &path,
            "tweet,id,user,reply\nBig news,7,alice,\"line one\nline two\"\nBig news,7,bob,short\n",
        )
        .unwrap();

        let records = read_reply_csv(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].reply, "line one\nline two");
        assert_eq!(records[0].id, "7");
        assert_eq!(records[1].reply, "short");
    }

    #[test]
    fn test_read_unterminated_quote_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "tweet,id,user,reply\nhello,7,alice,\"never closed\n").unwrap();

        let err = read_reply_csv(&path).unwrap_err();
        assert!(matches!(err, LabError::Dataset(_)));
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_read_rejects_missing_required_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "id,tweet\n7,hello\n").unwrap();

        assert!(matches!(
            read_reply_csv(&path),
            Err(LabError::Dataset(_)),
        ));
    }

    #[test]
    fn test_summarize_majority_per_tweet() {
        let records = vec![
            record(Some("positive"), "1", "tweet one", "r1"),
            record(Some("negative"), "1", "tweet one", "r2"),
            record(Some("positive"), "1", "tweet one", "r3"),
            record(Some("neutral"), "2", "tweet two", "r4"),
        ];
        let tweets = summarize(&records);
        assert_eq!(
            tweets,
            vec![
                LabeledTweet {
                    label: "positive".to_string(),
                    tweet: "tweet one".to_string(),
                },
                LabeledTweet {
                    label: "neutral".to_string(),
                    tweet: "tweet two".to_string(),
                },
            ],
        );
    }

    #[test]
    fn test_summarize_tie_keeps_first_seen_label() {
        let records = vec![
            record(Some("negative"), "1", "t", "r1"),
            record(Some("positive"), "1", "t", "r2"),
        ];
        let tweets = summarize(&records);
        assert_eq!(tweets[0].label, "negative");
    }

    #[test]
    fn test_summarize_skips_unlabeled() {
        let records = vec![record(None, "1", "t", "r1")];
        assert!(summarize(&records).is_empty());
    }
}
