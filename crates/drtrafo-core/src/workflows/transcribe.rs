use crate::engine::config::TranscriptionConfig;
use crate::engine::error::LandscapeError;
use crate::engine::landscape::TrafoLandscape;
use crate::engine::progress::{Progress, ProgressReporter};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Summary of one transcription step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub transcript_length: usize,
    pub new_nodes: usize,
    pub reactivated: usize,
    pub representatives: usize,
    pub coarse_edges: usize,
    /// Number of time points produced by the simulation.
    pub samples: usize,
    /// Simulated time in seconds.
    pub simulated_time: f64,
    pub pruned: usize,
    pub deleted: usize,
    /// Occupancy of every simulated node at the end of the step, keyed by
    /// node identity, before pruning moved any of it.
    pub occupancies: Vec<(String, f64)>,
}

/// Folds `landscape` co-transcriptionally until the full sequence is transcribed.
///
/// Each step extends the transcript by one nucleotide. The last step simulates
/// up to `config.t_end` instead of `config.t_ext`.
#[instrument(
    skip_all,
    name = "transcription_workflow",
    fields(length = landscape.sequence_length())
)]
pub fn run(
    landscape: &mut TrafoLandscape,
    config: &TranscriptionConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<StepReport>, LandscapeError> {
    config.validate()?;
    let full_length = landscape.sequence_length();
    let remaining = full_length.saturating_sub(landscape.transcript_length());
    info!(steps = remaining, "Starting co-transcriptional folding.");

    reporter.report(Progress::TaskStart {
        total_steps: remaining as u64,
    });
    let mut reports = Vec::with_capacity(remaining);
    while landscape.transcript_length() < full_length {
        let report = step(landscape, config, reporter)?;
        reporter.report(Progress::TaskIncrement);
        reporter.report(Progress::StepFinish {
            transcript_length: report.transcript_length,
            active_minima: landscape.active_local_minima().len(),
        });
        reports.push(report);
    }
    reporter.report(Progress::TaskFinish);

    info!(
        nodes = landscape.node_count(),
        edges = landscape.edge_count(),
        "Transcription complete."
    );
    Ok(reports)
}

fn step(
    landscape: &mut TrafoLandscape,
    config: &TranscriptionConfig,
    reporter: &ProgressReporter,
) -> Result<StepReport, LandscapeError> {
    let expansion = reporter.phase("Expansion", || landscape.expand(false))?;
    let transcript_length = landscape.transcript_length();
    let last = transcript_length == landscape.sequence_length();

    let (representatives, coarse_edges) =
        reporter.phase("Coarse-graining", || landscape.build_coarse_network())?;

    let (nodes, p0) = landscape.occupancies();
    let times = time_grid(config, last);
    let (p, samples) = reporter.phase("Simulation", || {
        let trajectory = landscape.simulate(&nodes, &p0, &times, &[], config.tolerance)?;
        let mut samples = 0;
        let mut p = p0.clone();
        for sample in trajectory {
            let (_, pt) = sample?;
            p = pt.iter().copied().collect();
            samples += 1;
        }
        Ok::<_, LandscapeError>((p, samples))
    })?;
    let p = renormalized(p);
    landscape.set_occupancies(&nodes, &p)?;

    let occupancies = nodes
        .iter()
        .zip(&p)
        .filter_map(|(key, &value)| {
            landscape
                .node(key)
                .map(|node| (node.identity().to_string(), value))
        })
        .collect();

    let pruning = reporter.phase("Pruning", || {
        landscape.prune(config.p_min, config.delth, &HashSet::new())
    })?;

    let report = StepReport {
        transcript_length,
        new_nodes: expansion.new_nodes.len(),
        reactivated: expansion.reactivated.len(),
        representatives,
        coarse_edges,
        samples,
        simulated_time: times.last().copied().unwrap_or_default(),
        pruned: pruning.pruned.len(),
        deleted: pruning.deleted.len(),
        occupancies,
    };
    debug!(
        length = report.transcript_length,
        new = report.new_nodes,
        reactivated = report.reactivated,
        representatives = report.representatives,
        pruned = report.pruned,
        deleted = report.deleted,
        "Step finished."
    );
    Ok(report)
}

/// Output times of one step: `t_lin` linear points up to `t_ext`, followed on
/// the last step by `t_log` logarithmic points up to `t_end`.
fn time_grid(config: &TranscriptionConfig, last: bool) -> Vec<f64> {
    let t_lin = config.t_lin as f64;
    let mut times: Vec<f64> = (1..=config.t_lin)
        .map(|i| config.t_ext * i as f64 / t_lin)
        .collect();
    if last && config.t_log > 0 {
        let ratio = config.t_end / config.t_ext;
        let t_log = config.t_log as f64;
        for j in 1..=config.t_log {
            let t = config.t_ext * ratio.powf(j as f64 / t_log);
            if times.last().is_none_or(|&previous| t > previous) {
                times.push(t);
            }
        }
    }
    times
}

/// Scales `p` to unit sum, absorbing integration drift.
fn renormalized(mut p: Vec<f64>) -> Vec<f64> {
    let total: f64 = p.iter().sum();
    if total > 0.0 {
        p.iter_mut().for_each(|value| *value /= total);
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::ConfigError;
    use crate::testing::{MockToolkit, landscape};
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    const OPEN: &str = ".........";
    const HAIRPIN: &str = "(((...)))";

    fn short_run() -> TranscriptionConfig {
        TranscriptionConfig {
            t_lin: 3,
            t_log: 5,
            t_end: 1.0,
            ..TranscriptionConfig::default()
        }
    }

    fn hairpin_landscape() -> TrafoLandscape {
        let toolkit = MockToolkit::default().mfe(9, HAIRPIN).barrier(50).build();
        TrafoLandscape::new("GGGAAACCC", Default::default(), toolkit)
    }

    #[test]
    fn time_grid_is_linear_until_the_last_step() {
        let config = short_run();
        let grid = time_grid(&config, false);
        assert_eq!(grid.len(), 3);
        assert_relative_eq!(grid[0], 0.04 / 3.0);
        assert_relative_eq!(grid[2], 0.04);

        let grid = time_grid(&config, true);
        assert_eq!(grid.len(), 8);
        assert_relative_eq!(grid[7], 1.0, epsilon = 1e-12);
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn time_grid_skips_log_points_without_extra_time() {
        let config = TranscriptionConfig {
            t_end: 0.04,
            ..short_run()
        };
        assert_eq!(time_grid(&config, true).len(), 3);
    }

    #[test]
    fn renormalization_restores_unit_sum() {
        let p = renormalized(vec![0.5, 0.49]);
        assert_relative_eq!(p.iter().sum::<f64>(), 1.0);
        assert_eq!(renormalized(vec![0.0]), vec![0.0]);
    }

    #[test]
    fn folds_into_the_hairpin() {
        let mut tl = hairpin_landscape();
        let reports = run(&mut tl, &short_run(), &ProgressReporter::new()).unwrap();

        assert_eq!(reports.len(), 9);
        assert_eq!(reports[0].new_nodes, 1);
        assert!(reports[..8].iter().all(|r| r.occupancies.len() == 1));

        let last = &reports[8];
        assert_eq!(last.transcript_length, 9);
        assert_eq!(last.new_nodes, 1);
        assert_eq!(last.representatives, 2);
        assert_eq!(last.samples, 8);
        assert_relative_eq!(last.simulated_time, 1.0, epsilon = 1e-12);
        assert_eq!(last.pruned, 1);

        let hairpin = tl.node(HAIRPIN).unwrap();
        assert!(hairpin.occupancy() > 0.99);
        assert!(!tl.node(OPEN).unwrap().is_active());
        assert_relative_eq!(tl.total_occupancy(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn reports_every_step_and_phase() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));
        let mut tl = landscape("GGGAA");
        run(&mut tl, &short_run(), &reporter).unwrap();
        drop(reporter);

        let events = events.into_inner().unwrap();
        assert_eq!(events.first(), Some(&Progress::TaskStart { total_steps: 5 }));
        assert_eq!(events.last(), Some(&Progress::TaskFinish));
        let steps: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                Progress::StepFinish {
                    transcript_length, ..
                } => Some(*transcript_length),
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5]);
        let phases = events
            .iter()
            .filter(|event| matches!(event, Progress::PhaseStart { .. }))
            .count();
        assert_eq!(phases, 20);
    }

    #[test]
    fn fully_transcribed_landscape_has_nothing_to_do() {
        let mut tl = landscape("GGG");
        tl.set_transcript_length(3);
        let reports = run(&mut tl, &short_run(), &ProgressReporter::new()).unwrap();
        assert!(reports.is_empty());
        assert_eq!(tl.node_count(), 0);
    }

    #[test]
    fn invalid_settings_are_rejected_before_folding() {
        let config = TranscriptionConfig {
            t_ext: 0.0,
            ..short_run()
        };
        let mut tl = landscape("GGG");
        let error = run(&mut tl, &config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            error,
            LandscapeError::Config {
                source: ConfigError::InvalidParameter { .. }
            }
        ));
        assert_eq!(tl.transcript_length(), 0);
    }
}
