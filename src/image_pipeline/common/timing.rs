use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Whether a step touches the filesystem. I/O steps are left out of
/// [`PipelineTimings::processing_duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Io,
    Compute,
}

#[derive(Debug, Clone)]
pub struct StepTiming {
    pub name: String,
    pub duration: Duration,
    pub kind: StepKind,
}

#[derive(Debug, Default)]
pub struct PipelineTimings {
    steps: Vec<StepTiming>,
    step_map: HashMap<String, Duration>,
}

impl PipelineTimings {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            step_map: HashMap::new(),
        }
    }

    pub fn add_step(&mut self, name: impl Into<String>, duration: Duration, kind: StepKind) {
        let name = name.into();
        self.steps.push(StepTiming {
            name: name.clone(),
            duration,
            kind,
        });
        *self.step_map.entry(name).or_insert(Duration::ZERO) += duration;
    }

    /// Appends every step of `other` after the steps already recorded.
    pub fn extend(&mut self, other: PipelineTimings) {
        for step in other.steps {
            self.add_step(step.name, step.duration, step.kind);
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }

    pub fn processing_duration(&self) -> Duration {
        self.steps
            .iter()
            .filter(|s| s.kind == StepKind::Compute)
            .map(|s| s.duration)
            .sum()
    }

    pub fn get_step(&self, name: &str) -> Option<Duration> {
        self.step_map.get(name).copied()
    }

    pub fn steps(&self) -> &[StepTiming] {
        &self.steps
    }

    pub fn print_summary(&self) {
        let total = self.total_duration();
        println!("\nPipeline Timing Summary:");
        println!("{:-<60}", "");
        for step in &self.steps {
            let percentage = if total.as_secs_f64() > 0.0 {
                (step.duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            } else {
                0.0
            };
            let marker = match step.kind {
                StepKind::Io => "io",
                StepKind::Compute => "",
            };
            println!(
                "{:<26} {:<3} {:>12.3}ms ({:>5.1}%)",
                step.name,
                marker,
                step.duration.as_secs_f64() * 1000.0,
                percentage
            );
        }
        println!("{:-<60}", "");
        println!(
            "{:<30} {:>12.3}ms",
            "Total",
            total.as_secs_f64() * 1000.0
        );
        println!(
            "{:<30} {:>12.3}ms",
            "Excluding I/O",
            self.processing_duration().as_secs_f64() * 1000.0
        );
    }
}

pub struct Timer {
    start: Instant,
    name: String,
    kind: StepKind,
}

impl Timer {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
            kind: StepKind::Compute,
        }
    }

    pub fn start_io(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
            kind: StepKind::Io,
        }
    }

    /// Stops the timer and records the elapsed time into `timings`.
    pub fn stop_into(self, timings: &mut PipelineTimings) {
        let duration = self.start.elapsed();
        timings.add_step(self.name, duration, self.kind);
    }
}
