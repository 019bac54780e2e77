use crate::import::batch::Batch;
use crate::import::file_key::FileKey;
use crate::import::tracker::{ConversionState, ConversionTracker};
use crate::models::{ImageCreatePayload, ImageUpdatePayload};
use thiserror::Error;
use tracing::warn;

/// Local validation failures. None of these ever reach the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title, description, and at least one image are required.")]
    MissingRequiredFields,
    #[error("Title and description are required.")]
    MissingTitleOrDescription,
    #[error("Title and Link are required.")]
    MissingLinkFields,
    #[error("Cannot edit: This entry has no link data.")]
    NoLinkData,
    #[error("{label} must be a number")]
    NotANumber { label: String },
    #[error("{failed} image(s) failed to convert and {pending} are still converting")]
    Unconverted { failed: usize, pending: usize },
}

/// Form fields being edited alongside a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    pub title: String,
    pub description: String,
}

impl RecordDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.description.trim().is_empty()
    }
}

/// What to do with files that aren't Ready at submission time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitPolicy {
    /// Leave them out of the payload and report them
    #[default]
    Lenient,
    /// Refuse to assemble until every file is Ready
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Failed(String),
    Pending,
}

/// A staged file that did not make it into the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub key: FileKey,
    pub reason: SkipReason,
}

/// An assembled payload plus the files it leaves out
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly<P> {
    pub payload: P,
    pub skipped: Vec<SkippedFile>,
}

/// Build the create payload for a new image collection.
///
/// Images are the Ready payloads of the batch's keys in ordinal order, so the
/// result is the same whatever order the conversions finished in.
pub fn assemble(
    draft: &RecordDraft,
    batch: &Batch,
    tracker: &ConversionTracker,
    policy: SubmitPolicy,
) -> Result<Assembly<ImageCreatePayload>, ValidationError> {
    if !draft.is_complete() || batch.is_empty() {
        return Err(ValidationError::MissingRequiredFields);
    }

    let (images, skipped) = harvest(batch, tracker, policy)?;

    Ok(Assembly {
        payload: ImageCreatePayload {
            title: draft.title.clone(),
            description: draft.description.clone(),
            images,
        },
        skipped,
    })
}

/// Build the update payload for an existing image collection.
///
/// `images` is only sent when the batch produced at least one new image.
pub fn assemble_update(
    draft: &RecordDraft,
    batch: &Batch,
    tracker: &ConversionTracker,
    policy: SubmitPolicy,
) -> Result<Assembly<ImageUpdatePayload>, ValidationError> {
    if !draft.is_complete() {
        return Err(ValidationError::MissingTitleOrDescription);
    }

    let (images, skipped) = if batch.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        harvest(batch, tracker, policy)?
    };

    Ok(Assembly {
        payload: ImageUpdatePayload {
            title: draft.title.clone(),
            description: draft.description.clone(),
            images: if images.is_empty() { None } else { Some(images) },
        },
        skipped,
    })
}

fn harvest(
    batch: &Batch,
    tracker: &ConversionTracker,
    policy: SubmitPolicy,
) -> Result<(Vec<String>, Vec<SkippedFile>), ValidationError> {
    let mut ready: Vec<(u64, String)> = Vec::new();
    let mut skipped = Vec::new();

    for key in batch.unique_keys() {
        match (tracker.state(&key), tracker.ordinal(&key)) {
            (Some(ConversionState::Ready(payload)), Some(ordinal)) => {
                ready.push((ordinal, payload.clone()));
            }
            (Some(ConversionState::Failed(reason)), _) => skipped.push(SkippedFile {
                key,
                reason: SkipReason::Failed(reason.clone()),
            }),
            _ => skipped.push(SkippedFile {
                key,
                reason: SkipReason::Pending,
            }),
        }
    }

    if policy == SubmitPolicy::Strict && !skipped.is_empty() {
        let failed = skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::Failed(_)))
            .count();
        return Err(ValidationError::Unconverted {
            failed,
            pending: skipped.len() - failed,
        });
    }

    for file in &skipped {
        match &file.reason {
            SkipReason::Failed(reason) => {
                warn!("Leaving {} out of the payload: {}", file.key, reason)
            }
            SkipReason::Pending => {
                warn!("Leaving {} out of the payload: still converting", file.key)
            }
        }
    }

    ready.sort_by_key(|(ordinal, _)| *ordinal);
    Ok((ready.into_iter().map(|(_, payload)| payload).collect(), skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::encoder::{EncodeError, Encoder};
    use crate::import::file_key::FileRef;
    use std::sync::Arc;

    /// Fails every file whose name starts with "bad"
    struct NameEncoder;

    #[async_trait::async_trait]
    impl Encoder for NameEncoder {
        async fn encode(&self, file: &FileRef) -> Result<String, EncodeError> {
            if file.name().starts_with("bad") {
                Err(EncodeError::NotAFile(file.name().to_string()))
            } else {
                Ok(format!("data:{}", file.name()))
            }
        }
    }

    fn file(name: &str, size: u64) -> FileRef {
        FileRef::new(format!("/staged/{}", name), name, size, None)
    }

    async fn settled(files: Vec<FileRef>) -> (Batch, ConversionTracker) {
        let mut batch = Batch::new();
        batch.add_files(files);
        let mut tracker = ConversionTracker::new(Arc::new(NameEncoder), None);
        tracker.sync(&batch);
        tracker.settle().await;
        (batch, tracker)
    }

    #[tokio::test]
    async fn test_two_of_three_converted() {
        let (batch, tracker) =
            settled(vec![file("a.png", 1), file("bad.png", 2), file("c.png", 3)]).await;

        let assembly = assemble(
            &RecordDraft::new("Bronze", "Cast"),
            &batch,
            &tracker,
            SubmitPolicy::Lenient,
        )
        .unwrap();

        assert_eq!(assembly.payload.images, vec!["data:a.png", "data:c.png"]);
        assert_eq!(assembly.skipped.len(), 1);
        assert!(matches!(assembly.skipped[0].reason, SkipReason::Failed(_)));
    }

    #[tokio::test]
    async fn test_strict_policy_refuses_failed_files() {
        let (batch, tracker) = settled(vec![file("a.png", 1), file("bad.png", 2)]).await;

        let err = assemble(
            &RecordDraft::new("Bronze", "Cast"),
            &batch,
            &tracker,
            SubmitPolicy::Strict,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ValidationError::Unconverted {
                failed: 1,
                pending: 0
            }
        );
    }

    #[tokio::test]
    async fn test_required_fields() {
        let (batch, tracker) = settled(vec![file("a.png", 1)]).await;
        let empty = Batch::new();

        for (draft, batch) in [
            (RecordDraft::new("", "Cast"), &batch),
            (RecordDraft::new("Bronze", "   "), &batch),
            (RecordDraft::new("Bronze", "Cast"), &empty),
        ] {
            assert_eq!(
                assemble(&draft, batch, &tracker, SubmitPolicy::Lenient).unwrap_err(),
                ValidationError::MissingRequiredFields
            );
        }
    }

    #[tokio::test]
    async fn test_unconverted_file_counts_as_pending() {
        let mut batch = Batch::new();
        batch.add_files(vec![file("a.png", 1)]);
        // Never synced, so nothing is tracked yet
        let tracker = ConversionTracker::new(Arc::new(NameEncoder), None);

        let assembly = assemble(
            &RecordDraft::new("Bronze", "Cast"),
            &batch,
            &tracker,
            SubmitPolicy::Lenient,
        )
        .unwrap();
        assert!(assembly.payload.images.is_empty());
        assert_eq!(assembly.skipped[0].reason, SkipReason::Pending);
    }

    #[tokio::test]
    async fn test_update_omits_images_without_new_files() {
        let (_, tracker) = settled(vec![]).await;
        let assembly = assemble_update(
            &RecordDraft::new("Bronze", "Cast"),
            &Batch::new(),
            &tracker,
            SubmitPolicy::Lenient,
        )
        .unwrap();
        assert_eq!(assembly.payload.images, None);

        let (batch, tracker) = settled(vec![file("new.png", 4)]).await;
        let assembly = assemble_update(
            &RecordDraft::new("Bronze", "Cast"),
            &batch,
            &tracker,
            SubmitPolicy::Lenient,
        )
        .unwrap();
        assert_eq!(assembly.payload.images, Some(vec!["data:new.png".to_string()]));
    }

    #[tokio::test]
    async fn test_update_requires_title_and_description() {
        let (batch, tracker) = settled(vec![file("new.png", 4)]).await;
        let err = assemble_update(
            &RecordDraft::new("Bronze", ""),
            &batch,
            &tracker,
            SubmitPolicy::Lenient,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingTitleOrDescription);
    }
}
