//! Inference recipes: held-out evaluation, manual phrase prediction, and
//! the reply-labeling pipeline.

pub mod predict;
pub mod reply;

pub use predict::{
    ClassStats, ClassificationReport, PredictedLabel, Predictor, evaluate, predict_phrase,
    restore_best, run_manual_predict, run_test,
};
pub use reply::{
    LabeledTweet, ReplyLabelReport, ReplyRecord, label_replies, read_reply_csv, summarize,
    write_reply_csv,
};
