//! Stepped hydraulic runs.

use wd_core::{LinkType, NodeType};
use wd_engine::{HydraulicEngine, LinkProperty, NodeProperty, StatusCode, TimeParameter};

use crate::error::SimResult;
use crate::settings::HydraulicSettings;
use crate::wds::WaterDistributionSystem;

/// Status of every solved period of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydraulicRun {
    pub steps: Vec<(u64, StatusCode)>,
    /// The engine reached the end of the horizon.
    pub completed: bool,
}

impl HydraulicRun {
    /// Completed with no warning.
    pub fn is_successful(&self) -> bool {
        self.completed && self.steps.iter().all(|(_, code)| code.is_ok())
    }

    /// Completed, warnings allowed.
    pub fn is_successful_with_warnings(&self) -> bool {
        self.completed && !self.steps.iter().any(|(_, code)| code.is_fatal())
    }

    pub fn warnings(&self) -> impl Iterator<Item = (u64, StatusCode)> + '_ {
        self.steps.iter().copied().filter(|(_, code)| code.is_warning())
    }

    pub fn fatal(&self) -> Option<(u64, StatusCode)> {
        self.steps.iter().copied().find(|(_, code)| code.is_fatal())
    }
}

impl<E: HydraulicEngine> WaterDistributionSystem<E> {
    /// Wipe every result series and the recorded times.
    pub fn clear_results(&mut self) {
        self.network.clear_results();
        self.times.clear();
    }

    /// Run the horizon step by step, pulling results into the element series.
    ///
    /// Fatal engine codes end the loop with `completed == false`; hydraulics are
    /// closed on every path. Errors are reserved for settings and model faults.
    pub fn run_hydraulics(&mut self, settings: &HydraulicSettings) -> SimResult<HydraulicRun> {
        settings.validate()?;
        for (which, value) in [
            (TimeParameter::Duration, settings.duration_s),
            (TimeParameter::HydraulicStep, settings.hydraulic_step_s),
            (TimeParameter::PatternStep, settings.pattern_step_s),
            (TimeParameter::ReportStep, settings.report_step_s),
        ] {
            self.adapter.set_time_parameter(which, value)?;
        }
        self.clear_results();
        self.refresh_indices()?;

        let mut run = HydraulicRun::default();
        let code = self.adapter.open_hydraulics();
        code.check("open_hydraulics")?;
        let code = self.adapter.init_hydraulics();
        if code.is_fatal() {
            run.steps.push((0, code));
            self.adapter.close_hydraulics();
            return Ok(run);
        }

        let outcome = self.step_loop(settings, &mut run);
        self.adapter.close_hydraulics();
        outcome?;

        tracing::debug!(
            steps = run.steps.len(),
            completed = run.completed,
            warnings = run.warnings().count(),
            "hydraulic run finished"
        );
        Ok(run)
    }

    fn step_loop(&mut self, settings: &HydraulicSettings, run: &mut HydraulicRun) -> SimResult<()> {
        loop {
            let (code, t) = self.adapter.run_hydraulics_step();
            run.steps.push((t, code));
            if code.is_fatal() {
                tracing::warn!(t, code = %code, "hydraulic step failed");
                return Ok(());
            }
            if settings.records(t) {
                self.record(t)?;
            }
            if code.is_warning() && settings.stop_on_warning {
                return Ok(());
            }

            let (code, step) = self.adapter.next_hydraulics_step();
            if code.is_fatal() {
                run.steps.push((t, code));
                return Ok(());
            }
            if step == 0 {
                run.completed = true;
                return Ok(());
            }
        }
    }

    /// Commit every series at `t`; `t` joins the recorded times only once
    /// all of them accepted it.
    fn record(&mut self, t: u64) -> SimResult<()> {
        let adapter = &self.adapter;
        let cache = &self.cache;

        for (id, node) in self.network.nodes_view_mut().iter_mut() {
            let Some(index) = cache.node(id) else {
                continue;
            };
            let r = &mut node.results;
            r.head.commit(t, adapter.node_value(index, NodeProperty::Head)?)?;
            r.pressure
                .commit(t, adapter.node_value(index, NodeProperty::Pressure)?)?;
            r.demand
                .commit(t, adapter.node_value(index, NodeProperty::Demand)?)?;
            if node.node_type() == NodeType::Tank {
                node.results
                    .level
                    .commit(t, adapter.node_value(index, NodeProperty::Level)?)?;
            }
        }

        for (id, link) in self.network.links_view_mut().iter_mut() {
            let Some(index) = cache.link(id) else {
                continue;
            };
            let r = &mut link.results;
            r.flow.commit(t, adapter.link_value(index, LinkProperty::Flow)?)?;
            r.velocity
                .commit(t, adapter.link_value(index, LinkProperty::Velocity)?)?;
            if link.link_type() == LinkType::Pump {
                link.results
                    .energy
                    .commit(t, adapter.link_value(index, LinkProperty::Energy)?)?;
                link.results
                    .status
                    .commit(t, adapter.link_value(index, LinkProperty::Status)?)?;
            }
        }
        self.times.push(t);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wd_core::LinkStatus;
    use wd_project::{LinkDef, LinkKindDef, NetworkDef, NodeDef, NodeKindDef};

    fn two_nodes() -> WaterDistributionSystem {
        let mut def = NetworkDef::new("two-nodes");
        def.nodes = vec![
            NodeDef {
                id: "R".into(),
                elevation: 50.0,
                kind: NodeKindDef::Reservoir { pattern: None },
            },
            NodeDef {
                id: "J".into(),
                elevation: 10.0,
                kind: NodeKindDef::Junction {
                    base_demand: 1.0,
                    pattern: None,
                },
            },
        ];
        def.links = vec![LinkDef {
            id: "P".into(),
            from: "R".into(),
            to: "J".into(),
            status: LinkStatus::Open,
            kind: LinkKindDef::Pipe {
                length: 100.0,
                diameter: 300.0,
                roughness: 130.0,
            },
        }];
        WaterDistributionSystem::from_def(&def).unwrap()
    }

    #[test]
    fn rejected_commit_keeps_times_aligned() {
        let mut wds = two_nodes();
        wds.cache_indices().unwrap();
        wds.record(0).unwrap();
        assert_eq!(wds.times(), &[0]);

        // A later sample already in one series makes the next commit fail.
        wds.network
            .node_mut("J")
            .unwrap()
            .results
            .pressure
            .commit(7200, 0.0)
            .unwrap();
        assert!(wds.record(3600).is_err());
        assert_eq!(wds.times(), &[0]);
    }
}
