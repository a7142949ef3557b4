use std::collections::{BTreeSet, HashSet};

use itemflow_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{StatusId, TransitionId, WorkflowId, WorkflowStatusId};

/// One status node of a workflow.
///
/// The node has its own identity; the tenant-level [`StatusId`] is what
/// makes two nodes in different workflows semantically equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    id: WorkflowStatusId,
    status_id: StatusId,
    status_name: NonEmptyString,
    position: u32,
}

impl WorkflowStatus {
    /// Creates a validated workflow status node.
    pub fn new(
        id: WorkflowStatusId,
        status_id: StatusId,
        status_name: impl Into<String>,
        position: u32,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            status_id,
            status_name: NonEmptyString::new(status_name)?,
            position,
        })
    }

    /// Returns the node identifier.
    #[must_use]
    pub fn id(&self) -> WorkflowStatusId {
        self.id
    }

    /// Returns the tenant-level status this node instantiates.
    #[must_use]
    pub fn status_id(&self) -> StatusId {
        self.status_id
    }

    /// Returns the status display name.
    #[must_use]
    pub fn status_name(&self) -> &NonEmptyString {
        &self.status_name
    }

    /// Returns the node ordering value.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }
}

/// Directed edge between two status nodes of the same workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    id: TransitionId,
    name: NonEmptyString,
    from_status: WorkflowStatusId,
    to_status: WorkflowStatusId,
}

impl Transition {
    /// Creates a validated transition.
    pub fn new(
        id: TransitionId,
        name: impl Into<String>,
        from_status: WorkflowStatusId,
        to_status: WorkflowStatusId,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            from_status,
            to_status,
        })
    }

    /// Returns the transition identifier.
    #[must_use]
    pub fn id(&self) -> TransitionId {
        self.id
    }

    /// Returns the transition display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the source node.
    #[must_use]
    pub fn from_status(&self) -> WorkflowStatusId {
        self.from_status
    }

    /// Returns the target node.
    #[must_use]
    pub fn to_status(&self) -> WorkflowStatusId {
        self.to_status
    }

    /// Returns whether either endpoint is one of the given nodes.
    #[must_use]
    pub fn touches_any(&self, nodes: &BTreeSet<WorkflowStatusId>) -> bool {
        nodes.contains(&self.from_status) || nodes.contains(&self.to_status)
    }
}

/// Snapshot of a tenant workflow: ordered status nodes and transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    id: WorkflowId,
    name: NonEmptyString,
    statuses: Vec<WorkflowStatus>,
    transitions: Vec<Transition>,
}

impl Workflow {
    /// Creates a validated workflow snapshot.
    ///
    /// Status nodes are ordered by position. A status may appear only once and
    /// every transition must connect nodes of this workflow.
    pub fn new(
        id: WorkflowId,
        name: impl Into<String>,
        mut statuses: Vec<WorkflowStatus>,
        transitions: Vec<Transition>,
    ) -> AppResult<Self> {
        let name = NonEmptyString::new(name)?;

        let mut node_ids = HashSet::new();
        let mut status_ids = HashSet::new();
        for status in &statuses {
            if !node_ids.insert(status.id) {
                return Err(AppError::Validation(format!(
                    "workflow '{}' contains workflow status '{}' more than once",
                    name, status.id
                )));
            }
            if !status_ids.insert(status.status_id) {
                return Err(AppError::Validation(format!(
                    "workflow '{}' contains status '{}' more than once",
                    name, status.status_name
                )));
            }
        }

        let mut transition_ids = HashSet::new();
        for transition in &transitions {
            if !transition_ids.insert(transition.id) {
                return Err(AppError::Validation(format!(
                    "workflow '{}' contains transition '{}' more than once",
                    name, transition.id
                )));
            }
            if !node_ids.contains(&transition.from_status)
                || !node_ids.contains(&transition.to_status)
            {
                return Err(AppError::Validation(format!(
                    "transition '{}' of workflow '{}' references a status outside the workflow",
                    transition.name, name
                )));
            }
        }

        statuses.sort_by_key(WorkflowStatus::position);

        Ok(Self {
            id,
            name,
            statuses,
            transitions,
        })
    }

    /// Returns the workflow identifier.
    #[must_use]
    pub fn id(&self) -> WorkflowId {
        self.id
    }

    /// Returns the workflow display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns status nodes ordered by position.
    #[must_use]
    pub fn statuses(&self) -> &[WorkflowStatus] {
        &self.statuses
    }

    /// Returns all transitions.
    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Finds a status node by node identifier.
    #[must_use]
    pub fn workflow_status(&self, id: WorkflowStatusId) -> Option<&WorkflowStatus> {
        self.statuses.iter().find(|status| status.id == id)
    }

    /// Finds the node instantiating a tenant-level status.
    #[must_use]
    pub fn node_for_status(&self, status_id: StatusId) -> Option<&WorkflowStatus> {
        self.statuses
            .iter()
            .find(|status| status.status_id == status_id)
    }

    /// Finds a transition by identifier.
    #[must_use]
    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|transition| transition.id == id)
    }

    /// Resolves a transition to the pair of tenant-level statuses it connects.
    #[must_use]
    pub fn transition_endpoints(&self, transition: &Transition) -> Option<(StatusId, StatusId)> {
        let from = self.workflow_status(transition.from_status)?;
        let to = self.workflow_status(transition.to_status)?;
        Some((from.status_id, to.status_id))
    }

    /// Finds a transition connecting two tenant-level statuses.
    ///
    /// When several transitions connect the same pair, the one named
    /// `preferred_name` wins, otherwise the first in declaration order.
    #[must_use]
    pub fn transition_between(
        &self,
        from: StatusId,
        to: StatusId,
        preferred_name: &str,
    ) -> Option<&Transition> {
        let mut candidates = self
            .transitions
            .iter()
            .filter(|transition| self.transition_endpoints(transition) == Some((from, to)))
            .peekable();

        let first = *candidates.peek()?;
        Some(
            candidates
                .find(|transition| transition.name.as_str() == preferred_name)
                .unwrap_or(first),
        )
    }

    /// Returns every transition that must disappear with the given nodes.
    ///
    /// A transition cannot outlive either of its endpoints, so the closure is
    /// every transition whose source or target is removed.
    #[must_use]
    pub fn transition_closure(&self, removed: &BTreeSet<WorkflowStatusId>) -> Vec<&Transition> {
        self.transitions
            .iter()
            .filter(|transition| transition.touches_any(removed))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::{Transition, Workflow, WorkflowStatus};
    use crate::{StatusId, TransitionId, WorkflowId, WorkflowStatusId};

    fn node(name: &str, position: u32) -> WorkflowStatus {
        WorkflowStatus::new(WorkflowStatusId::new(), StatusId::new(), name, position)
            .unwrap_or_else(|_| unreachable!())
    }

    fn edge(name: &str, from: &WorkflowStatus, to: &WorkflowStatus) -> Transition {
        Transition::new(TransitionId::new(), name, from.id(), to.id())
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn workflow_rejects_transition_to_foreign_node() {
        let open = node("Open", 0);
        let foreign = node("Elsewhere", 1);
        let transition = edge("Escape", &open, &foreign);

        let workflow = Workflow::new(WorkflowId::new(), "Basic", vec![open], vec![transition]);
        assert!(workflow.is_err());
    }

    #[test]
    fn workflow_rejects_duplicate_status() {
        let open = node("Open", 0);
        let again = WorkflowStatus::new(WorkflowStatusId::new(), open.status_id(), "Open", 1)
            .unwrap_or_else(|_| unreachable!());

        let workflow = Workflow::new(WorkflowId::new(), "Basic", vec![open, again], Vec::new());
        assert!(workflow.is_err());
    }

    #[test]
    fn statuses_are_ordered_by_position() {
        let closed = node("Closed", 2);
        let open = node("Open", 0);
        let workflow = Workflow::new(WorkflowId::new(), "Basic", vec![closed, open], Vec::new())
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(workflow.statuses()[0].status_name().as_str(), "Open");
    }

    #[test]
    fn closure_includes_unrequested_incident_transitions() {
        let open = node("Open", 0);
        let review = node("Review", 1);
        let closed = node("Closed", 2);
        let submit = edge("Submit", &open, &review);
        let close = edge("Close", &review, &closed);
        let reopen = edge("Reopen", &closed, &open);
        let workflow = Workflow::new(
            WorkflowId::new(),
            "Review flow",
            vec![open, review.clone(), closed],
            vec![submit.clone(), close.clone(), reopen],
        )
        .unwrap_or_else(|_| unreachable!());

        let removed = BTreeSet::from([review.id()]);
        let closure: Vec<_> = workflow
            .transition_closure(&removed)
            .into_iter()
            .map(Transition::id)
            .collect();

        assert_eq!(closure, vec![submit.id(), close.id()]);
    }

    #[test]
    fn closure_of_isolated_status_is_empty() {
        let open = node("Open", 0);
        let parked = node("Parked", 1);
        let closed = node("Closed", 2);
        let close = edge("Close", &open, &closed);
        let workflow = Workflow::new(
            WorkflowId::new(),
            "Basic",
            vec![open, parked.clone(), closed],
            vec![close],
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(
            workflow
                .transition_closure(&BTreeSet::from([parked.id()]))
                .is_empty()
        );
    }

    #[test]
    fn transition_between_prefers_matching_name() {
        let open = node("Open", 0);
        let closed = node("Closed", 1);
        let fast = edge("Fast close", &open, &closed);
        let slow = edge("Close", &open, &closed);
        let workflow = Workflow::new(
            WorkflowId::new(),
            "Basic",
            vec![open.clone(), closed.clone()],
            vec![fast.clone(), slow.clone()],
        )
        .unwrap_or_else(|_| unreachable!());

        let preferred = workflow.transition_between(open.status_id(), closed.status_id(), "Close");
        assert_eq!(preferred.map(Transition::id), Some(slow.id()));

        let fallback = workflow.transition_between(open.status_id(), closed.status_id(), "Other");
        assert_eq!(fallback.map(Transition::id), Some(fast.id()));

        let reversed = workflow.transition_between(closed.status_id(), open.status_id(), "Close");
        assert!(reversed.is_none());
    }

    proptest! {
        #[test]
        fn closure_is_exactly_the_incident_transitions(
            node_count in 1_usize..8,
            raw_edges in proptest::collection::vec((0_usize..8, 0_usize..8), 0..20),
            removed_mask in proptest::collection::vec(any::<bool>(), 8),
        ) {
            let nodes: Vec<WorkflowStatus> = (0..node_count)
                .map(|index| node(format!("S{index}").as_str(), index as u32))
                .collect();
            let transitions: Vec<Transition> = raw_edges
                .iter()
                .map(|(from, to)| {
                    edge("T", &nodes[from % node_count], &nodes[to % node_count])
                })
                .collect();
            let workflow = Workflow::new(
                WorkflowId::new(),
                "Generated",
                nodes.clone(),
                transitions.clone(),
            )
            .unwrap_or_else(|_| unreachable!());

            let removed: BTreeSet<_> = nodes
                .iter()
                .zip(removed_mask.iter())
                .filter_map(|(status, removed)| removed.then_some(status.id()))
                .collect();
            let closure: BTreeSet<_> = workflow
                .transition_closure(&removed)
                .into_iter()
                .map(Transition::id)
                .collect();

            for transition in &transitions {
                let incident = removed.contains(&transition.from_status())
                    || removed.contains(&transition.to_status());
                prop_assert_eq!(closure.contains(&transition.id()), incident);
            }
        }
    }
}
