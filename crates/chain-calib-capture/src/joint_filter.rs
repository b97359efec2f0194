//! Extraction of per-chain joint configurations from joint-state broadcasts.

use crate::{ChainGroupConfig, ConfigError, JointStateError, StreamBuffer, UpdateSignal};
use chain_calib_core::{ChainObservation, JointState, JointValue};
use log::{debug, error};
use std::sync::Arc;

/// Filters joint-state broadcasts down to one chain group.
///
/// A broadcast is accepted only if it mentions the group's first joint.
/// Accepted broadcasts produce a [`ChainObservation`] in configured joint
/// order, which replaces the contents of the group's buffer.
#[derive(Debug)]
pub struct JointStateFilter {
    chain_id: String,
    joint_names: Vec<String>,
    buffer: Arc<StreamBuffer<ChainObservation>>,
}

impl JointStateFilter {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the group has no joint names.
    pub fn new(group: &ChainGroupConfig, signal: Arc<UpdateSignal>) -> Result<Self, ConfigError> {
        group.validate()?;
        Ok(Self {
            chain_id: group.chain_id.clone(),
            joint_names: group.joint_names.clone(),
            buffer: StreamBuffer::shared(group.chain_id.clone(), signal),
        })
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn buffer(&self) -> Arc<StreamBuffer<ChainObservation>> {
        Arc::clone(&self.buffer)
    }

    /// Extract this group's joints from `msg` without touching the buffer.
    ///
    /// Returns `Ok(None)` if the broadcast belongs to another group.
    ///
    /// # Errors
    ///
    /// - [`JointStateError::Malformed`] if an accepted broadcast has fewer or
    ///   more positions than names,
    /// - [`ConfigError::MissingJoint`] if the broadcast carries the first
    ///   configured joint but lacks a later one.
    pub fn filter(&self, msg: &JointState) -> Result<Option<ChainObservation>, JointStateError> {
        let Some(first) = self.joint_names.first() else {
            return Ok(None);
        };
        if !msg.contains(first) {
            return Ok(None);
        }
        if msg.name.len() != msg.position.len() {
            return Err(JointStateError::Malformed {
                names: msg.name.len(),
                positions: msg.position.len(),
            });
        }

        let joints = self
            .joint_names
            .iter()
            .map(|name| {
                msg.position_of(name)
                    .map(|position| JointValue {
                        name: name.clone(),
                        position,
                    })
                    .ok_or_else(|| ConfigError::MissingJoint {
                        chain_id: self.chain_id.clone(),
                        joint: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ChainObservation::new(
            self.chain_id.clone(),
            msg.header.stamp,
            joints,
        )))
    }

    /// Delivery callback: filter `msg` and refresh the buffer on acceptance.
    ///
    /// Returns whether the broadcast was accepted.
    pub fn on_joint_state(&self, msg: &JointState) -> Result<bool, JointStateError> {
        match self.filter(msg)? {
            Some(obs) => {
                self.buffer.publish(obs);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Fans one joint-state channel out to every chain group.
#[derive(Debug, Default)]
pub struct JointStateRouter {
    filters: Vec<JointStateFilter>,
}

impl JointStateRouter {
    pub fn from_config(
        groups: &[ChainGroupConfig],
        signal: &Arc<UpdateSignal>,
    ) -> Result<Self, ConfigError> {
        let filters = groups
            .iter()
            .map(|g| JointStateFilter::new(g, Arc::clone(signal)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filters })
    }

    pub fn filters(&self) -> &[JointStateFilter] {
        &self.filters
    }

    /// Buffers of all groups, in configuration order.
    pub fn buffers(&self) -> Vec<Arc<StreamBuffer<ChainObservation>>> {
        self.filters.iter().map(JointStateFilter::buffer).collect()
    }

    /// Check `msg` against every group without touching any buffer.
    ///
    /// # Errors
    ///
    /// The first [`JointStateError`] any group reports.
    pub fn check(&self, msg: &JointState) -> Result<usize, JointStateError> {
        let mut accepted = 0;
        for filter in &self.filters {
            if filter.filter(msg)?.is_some() {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Offer `msg` to every group; returns how many accepted it.
    ///
    /// # Errors
    ///
    /// Stops at the first group whose configured joints are inconsistent
    /// with an accepted broadcast.
    pub fn on_joint_state(&self, msg: &JointState) -> Result<usize, JointStateError> {
        let mut accepted = 0;
        for filter in &self.filters {
            match filter.on_joint_state(msg) {
                Ok(true) => accepted += 1,
                Ok(false) => {}
                Err(err) => {
                    error!("joint state rejected: {err}");
                    return Err(err);
                }
            }
        }
        if accepted == 0 {
            debug!("joint state with {} joints matched no group", msg.name.len());
        }
        Ok(accepted)
    }
}
