// SPDX-License-Identifier: MIT OR Apache-2.0
//! Batched baking.
//!
//! Sampling a scene over a frame range costs a full evaluation per frame,
//! so work from several participants is gathered into one [`BakeQueue`].
//! Running the queue executes every pre step, then a single sampling pass
//! covering every request, then every post step.

use crate::curve::Channel;
use crate::timeline::FrameRange;

/// Request to sample channels of some targets into keys
#[derive(Debug, Clone, PartialEq)]
pub struct BakeRequest<T> {
    /// Label used in logs
    pub label: String,
    /// Objects whose channels are sampled
    pub targets: Vec<T>,
    /// Channels to key
    pub channels: Vec<Channel>,
    /// Frames to sample
    pub range: FrameRange,
}

impl<T> BakeRequest<T> {
    /// Request every transform channel of `targets` over `range`
    pub fn new(label: impl Into<String>, targets: Vec<T>, range: FrameRange) -> Self {
        Self {
            label: label.into(),
            targets,
            channels: Channel::ALL.to_vec(),
            range,
        }
    }
}

/// Executes queued steps and samples requests
pub trait BakeDriver<T, S> {
    /// Error raised by steps or sampling
    type Error: std::error::Error + 'static;

    /// Run a single pre or post step
    fn run_step(&mut self, step: S) -> Result<(), Self::Error>;

    /// Sample every request in one pass, returning the number of keys written
    fn sample(&mut self, requests: &[BakeRequest<T>]) -> Result<usize, Self::Error>;
}

/// Failure while running a queue, tagged with the phase it happened in
#[derive(Debug, thiserror::Error)]
pub enum BakeError<E: std::error::Error + 'static> {
    /// A pre step failed
    #[error("Pre-bake step {index} failed: {source}")]
    Pre {
        /// Step position
        index: usize,
        /// Underlying error
        source: E,
    },

    /// The sampling pass failed
    #[error("Batched bake failed: {0}")]
    Sample(#[source] E),

    /// A post step failed
    #[error("Post-bake step {index} failed: {source}")]
    Post {
        /// Step position
        index: usize,
        /// Underlying error
        source: E,
    },
}

impl<E: std::error::Error + 'static> BakeError<E> {
    /// Name of the failed phase
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Pre { .. } => "pre",
            Self::Sample(_) => "sample",
            Self::Post { .. } => "post",
        }
    }

    /// Unwrap the underlying error
    pub fn into_inner(self) -> E {
        match self {
            Self::Pre { source, .. } | Self::Post { source, .. } | Self::Sample(source) => source,
        }
    }
}

/// What a queue run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BakeSummary {
    /// Pre steps executed
    pub pre_steps: usize,
    /// Requests sampled
    pub requests: usize,
    /// Keys written by the sampling pass
    pub keys_written: usize,
    /// Post steps executed
    pub post_steps: usize,
}

impl std::ops::AddAssign for BakeSummary {
    fn add_assign(&mut self, other: Self) {
        self.pre_steps += other.pre_steps;
        self.requests += other.requests;
        self.keys_written += other.keys_written;
        self.post_steps += other.post_steps;
    }
}

/// Ordered pre steps, bake requests and post steps
#[derive(Debug, Clone)]
pub struct BakeQueue<T, S> {
    pre: Vec<S>,
    requests: Vec<BakeRequest<T>>,
    post: Vec<S>,
}

impl<T, S> Default for BakeQueue<T, S> {
    fn default() -> Self {
        Self {
            pre: Vec::new(),
            requests: Vec::new(),
            post: Vec::new(),
        }
    }
}

impl<T, S> BakeQueue<T, S> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a step to run before sampling
    pub fn push_pre(&mut self, step: S) {
        self.pre.push(step);
    }

    /// Queue a bake request
    pub fn push_request(&mut self, request: BakeRequest<T>) {
        self.requests.push(request);
    }

    /// Queue a step to run after sampling
    pub fn push_post(&mut self, step: S) {
        self.post.push(step);
    }

    /// Queued requests
    pub fn requests(&self) -> &[BakeRequest<T>] {
        &self.requests
    }

    /// Number of queued pre steps
    pub fn pre_len(&self) -> usize {
        self.pre.len()
    }

    /// Number of queued post steps
    pub fn post_len(&self) -> usize {
        self.post.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.requests.is_empty() && self.post.is_empty()
    }

    /// Range covering every request
    pub fn total_range(&self) -> Option<FrameRange> {
        self.requests
            .iter()
            .map(|r| r.range)
            .reduce(|a, b| a.union(&b))
    }

    /// Run all pre steps, one sampling pass, then all post steps.
    ///
    /// Stops at the first failure.
    pub fn run<D>(self, driver: &mut D) -> Result<BakeSummary, BakeError<D::Error>>
    where
        D: BakeDriver<T, S>,
    {
        let mut summary = BakeSummary {
            requests: self.requests.len(),
            ..BakeSummary::default()
        };

        for (index, step) in self.pre.into_iter().enumerate() {
            driver
                .run_step(step)
                .map_err(|source| BakeError::Pre { index, source })?;
            summary.pre_steps += 1;
        }

        if !self.requests.is_empty() {
            tracing::debug!(
                "Baking {} requests in one pass: {}",
                self.requests.len(),
                self.requests
                    .iter()
                    .map(|r| r.label.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            summary.keys_written = driver.sample(&self.requests).map_err(BakeError::Sample)?;
        }

        for (index, step) in self.post.into_iter().enumerate() {
            driver
                .run_step(step)
                .map_err(|source| BakeError::Post { index, source })?;
            summary.post_steps += 1;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("step {0} refused")]
    struct Refused(&'static str);

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl BakeDriver<&'static str, &'static str> for Recorder {
        type Error = Refused;

        fn run_step(&mut self, step: &'static str) -> Result<(), Refused> {
            if self.fail_on == Some(step) {
                return Err(Refused(step));
            }
            self.log.push(step.to_string());
            Ok(())
        }

        fn sample(&mut self, requests: &[BakeRequest<&'static str>]) -> Result<usize, Refused> {
            let targets: Vec<&str> = requests.iter().flat_map(|r| r.targets.clone()).collect();
            self.log.push(format!("sample[{}]", targets.join(",")));
            Ok(targets.len())
        }
    }

    #[test]
    fn test_steps_are_not_interleaved() {
        let mut queue = BakeQueue::new();
        for name in ["a", "b"] {
            queue.push_pre(if name == "a" { "pre_a" } else { "pre_b" });
            queue.push_request(BakeRequest::new(name, vec![name], FrameRange::new(0.0, 4.0)));
            queue.push_post(if name == "a" { "post_a" } else { "post_b" });
        }

        let mut driver = Recorder::default();
        let summary = queue.run(&mut driver).unwrap();

        assert_eq!(driver.log, vec!["pre_a", "pre_b", "sample[a,b]", "post_a", "post_b"]);
        assert_eq!(
            summary,
            BakeSummary {
                pre_steps: 2,
                requests: 2,
                keys_written: 2,
                post_steps: 2,
            }
        );
    }

    #[test]
    fn test_failure_reports_phase() {
        let mut queue: BakeQueue<&'static str, &'static str> = BakeQueue::new();
        queue.push_pre("ok");
        queue.push_post("broken");

        let mut driver = Recorder {
            fail_on: Some("broken"),
            ..Recorder::default()
        };
        let err = queue.run(&mut driver).unwrap_err();
        assert_eq!(err.phase(), "post");
        assert_eq!(err.into_inner().0, "broken");
    }

    #[test]
    fn test_summaries_accumulate() {
        let mut total = BakeSummary::default();
        total += BakeSummary {
            pre_steps: 2,
            requests: 1,
            keys_written: 18,
            post_steps: 1,
        };
        total += BakeSummary {
            pre_steps: 1,
            requests: 1,
            keys_written: 9,
            post_steps: 1,
        };
        assert_eq!(
            total,
            BakeSummary {
                pre_steps: 3,
                requests: 2,
                keys_written: 27,
                post_steps: 2,
            }
        );
    }

    #[test]
    fn test_total_range() {
        let mut queue: BakeQueue<u32, ()> = BakeQueue::new();
        assert!(queue.total_range().is_none());
        queue.push_request(BakeRequest::new("x", vec![1], FrameRange::new(0.0, 10.0)));
        queue.push_request(BakeRequest::new("y", vec![2], FrameRange::new(5.0, 30.0)));
        assert_eq!(queue.total_range(), Some(FrameRange::new(0.0, 30.0)));
    }
}
