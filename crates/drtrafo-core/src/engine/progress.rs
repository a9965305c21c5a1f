/// Events emitted while a transcription run advances.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    /// One nucleotide has been processed.
    StepFinish {
        transcript_length: usize,
        active_minima: usize,
    },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Runs `phase` between a start and a finish event.
    pub fn phase<T>(&self, name: &'static str, phase: impl FnOnce() -> T) -> T {
        self.report(Progress::PhaseStart { name });
        let result = phase();
        self.report(Progress::PhaseFinish);
        result
    }
}
