//! Hierarchical temporal range index.
//!
//! Calendar nodes form a lazily-grown trie in the host graph, keyed by
//! granularity: root → year → month → day. Day leaves link to entities
//! under a [`TimeRole`]. Child→parent navigation is an incoming-`Child`
//! lookup on the graph, never an owning back-pointer, so the structure
//! stays acyclic.

use crate::config::PruningPolicy;
use crate::error::{ContinuumError, Result};
use crate::graph::{
    EntityId, GraphState, GraphStore, Label, LinkType, PROP_VALUE, PropValue, Transaction,
};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// How an entity hangs off a day leaf: interval endpoints or a single
/// instant event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRole {
    Start,
    End,
    Event,
}

impl TimeRole {
    pub(crate) fn link_type(self) -> LinkType {
        match self {
            TimeRole::Start => LinkType::Start,
            TimeRole::End => LinkType::End,
            TimeRole::Event => LinkType::Event,
        }
    }
}

const ROLE_LINKS: [LinkType; 3] = [LinkType::Start, LinkType::End, LinkType::Event];

/// Default date components when an intermediate calendar value is missing
/// during upward resolution.
const DEFAULT_YEAR: i64 = 1970;
const DEFAULT_MONTH: i64 = 1;
const DEFAULT_DAY: i64 = 1;

/// The hierarchical temporal index service.
pub struct TemporalIndex {
    graph: Arc<GraphStore>,
}

impl TemporalIndex {
    pub(crate) fn new(graph: Arc<GraphStore>) -> Self {
        Self { graph }
    }

    /// Attach an entity to the calendar leaf for `instant` (UTC), creating
    /// the root→year→month→day path as needed, through the caller's
    /// transaction.
    pub fn attach(
        &self,
        tx: &mut Transaction<'_>,
        entity: EntityId,
        role: TimeRole,
        instant: DateTime<Utc>,
    ) -> Result<()> {
        if !tx.graph().contains(entity) {
            return Err(ContinuumError::EntityNotFound(entity));
        }
        let leaf = day_leaf(tx, instant)?;
        tx.create_link(leaf, role.link_type(), entity)?;
        log::debug!(
            "attached {entity} to calendar leaf {} for {}",
            leaf,
            instant.date_naive()
        );
        Ok(())
    }

    /// Every entity linked from a day leaf whose date falls in
    /// `[from, to]` (inclusive), regardless of role.
    ///
    /// An interval entity is returned when EITHER of its endpoints falls in
    /// range. This mirrors the attachment-based overlap test of the original
    /// design and is not full interval-overlap: an interval strictly
    /// containing the query range, with both endpoints outside it, is
    /// missed. Documented policy, kept deliberately.
    pub fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<FxHashSet<EntityId>> {
        if from > to {
            return Err(ContinuumError::InvalidTimeRange {
                start: from,
                end: to,
            });
        }
        let state = self.graph.read();
        let hits = collect_range(&state, from.date_naive(), to.date_naive());
        log::debug!("temporal query matched {} entities", hits.len());
        Ok(hits)
    }

    /// Resolve an entity's indexed instant by walking upward from its leaf
    /// attachment through day → month → year, reading the numeric values.
    ///
    /// Prefers the `Event` attachment, falling back to `Start`. Missing
    /// values leave the component at its default (day 1, month 1,
    /// year 1970). The result is truncated to day granularity.
    pub fn resolve(&self, entity: EntityId) -> Option<DateTime<Utc>> {
        let state = self.graph.read();
        resolve_in(&state, entity)
    }

    /// Detach an entity's role links through the caller's transaction.
    /// Under [`PruningPolicy::Eager`], vacated leaves and their emptied
    /// ancestors are deleted in the same transaction.
    pub(crate) fn detach(
        &self,
        tx: &mut Transaction<'_>,
        entity: EntityId,
        policy: PruningPolicy,
    ) -> Result<()> {
        let attachments: Vec<(EntityId, LinkType)> = {
            let g = tx.graph();
            ROLE_LINKS
                .iter()
                .flat_map(|&ty| g.links_in(entity, ty).map(move |leaf| (leaf, ty)))
                .collect()
        };
        for (leaf, ty) in attachments {
            tx.remove_link(leaf, ty, entity)?;
            if policy == PruningPolicy::Eager {
                prune_upward(tx, leaf)?;
            }
        }
        Ok(())
    }
}

fn day_leaf(tx: &mut Transaction<'_>, instant: DateTime<Utc>) -> Result<EntityId> {
    let root = tx.graph().calendar_root();
    let year = child_for(tx, root, Label::Year, i64::from(instant.year()))?;
    let month = child_for(tx, year, Label::Month, i64::from(instant.month()))?;
    child_for(tx, month, Label::Day, i64::from(instant.day()))
}

/// Walk or lazily create the child of `parent` carrying `label` and the
/// given calendar value.
fn child_for(
    tx: &mut Transaction<'_>,
    parent: EntityId,
    label: Label,
    value: i64,
) -> Result<EntityId> {
    let existing = {
        let g = tx.graph();
        g.links_out(parent, LinkType::Child).find(|&child| {
            g.has_label(child, label)
                && g.prop(child, PROP_VALUE).and_then(PropValue::as_i64) == Some(value)
        })
    };
    if let Some(child) = existing {
        return Ok(child);
    }
    let child = tx.create_node(&[label]);
    tx.set_prop(child, PROP_VALUE, PropValue::Int(value))?;
    tx.create_link(parent, LinkType::Child, child)?;
    Ok(child)
}

fn value_of(state: &GraphState, node: EntityId) -> Option<i64> {
    state.prop(node, PROP_VALUE).and_then(PropValue::as_i64)
}

pub(crate) fn collect_range(
    state: &GraphState,
    from: NaiveDate,
    to: NaiveDate,
) -> FxHashSet<EntityId> {
    let mut hits = FxHashSet::default();
    let root = state.calendar_root();
    for year in state.links_out(root, LinkType::Child) {
        let Some(y) = value_of(state, year) else {
            continue;
        };
        if y < i64::from(from.year()) || y > i64::from(to.year()) {
            continue;
        }
        for month in state.links_out(year, LinkType::Child) {
            let Some(m) = value_of(state, month) else {
                continue;
            };
            if (y, m) < (i64::from(from.year()), i64::from(from.month()))
                || (y, m) > (i64::from(to.year()), i64::from(to.month()))
            {
                continue;
            }
            for day in state.links_out(month, LinkType::Child) {
                let Some(d) = value_of(state, day) else {
                    continue;
                };
                let Some(date) =
                    NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32)
                else {
                    continue;
                };
                if date < from || date > to {
                    continue;
                }
                for role in ROLE_LINKS {
                    hits.extend(state.links_out(day, role));
                }
            }
        }
    }
    hits
}

pub(crate) fn resolve_in(state: &GraphState, entity: EntityId) -> Option<DateTime<Utc>> {
    let leaf = state
        .first_link_in(entity, LinkType::Event)
        .or_else(|| state.first_link_in(entity, LinkType::Start))?;

    let mut year = DEFAULT_YEAR;
    let mut month = DEFAULT_MONTH;
    let mut day = DEFAULT_DAY;

    let mut current = Some(leaf);
    while let Some(node) = current {
        if state.has_label(node, Label::CalendarRoot) {
            break;
        }
        if state.has_label(node, Label::Day) {
            if let Some(v) = value_of(state, node) {
                day = v;
            }
        } else if state.has_label(node, Label::Month) {
            if let Some(v) = value_of(state, node) {
                month = v;
            }
        } else if state.has_label(node, Label::Year)
            && let Some(v) = value_of(state, node)
        {
            year = v;
        }
        current = state.first_link_in(node, LinkType::Child);
    }

    let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

/// Whether a calendar node has no members and no children left.
fn is_vacant(state: &GraphState, node: EntityId) -> bool {
    state.out_degree(node) == 0
}

/// Delete a vacated calendar node and any ancestors it leaves empty,
/// stopping at the root.
pub(crate) fn prune_upward(tx: &mut Transaction<'_>, start: EntityId) -> Result<()> {
    let mut node = start;
    loop {
        let parent = {
            let g = tx.graph();
            if g.has_label(node, Label::CalendarRoot) || !is_vacant(g, node) {
                break;
            }
            g.first_link_in(node, LinkType::Child)
        };
        tx.delete_node(node)?;
        match parent {
            Some(p) => node = p,
            None => break,
        }
    }
    Ok(())
}
