//! Remapping of two independently interned stack sources into one table.

use crate::model::{CallPathId, FrameId, StackSource, StackSourceBuilder};

/// Per-input translation from source ids to ids in the combined builder
#[derive(Debug, Default)]
struct InputMap {
    frames: Vec<FrameId>,
    paths: Vec<CallPathId>,
}

/// Translation tables for one (data, baseline) pair.
///
/// Frames match by (module, name). Ids in the combined builder are assigned
/// in first-seen order: all of data's frames in id order, then baseline's.
#[derive(Debug)]
pub struct RemapTable {
    data: InputMap,
    baseline: InputMap,
}

/// Which side of the pair an id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Data,
    Baseline,
}

impl RemapTable {
    /// Intern both inputs' frames and call paths into `builder`
    pub fn build(
        data: &StackSource,
        baseline: &StackSource,
        builder: &mut StackSourceBuilder,
    ) -> Self {
        let mut data_map = InputMap::default();
        let mut baseline_map = InputMap::default();

        remap_frames(data, builder, &mut data_map);
        remap_frames(baseline, builder, &mut baseline_map);
        remap_paths(data, builder, &mut data_map);
        remap_paths(baseline, builder, &mut baseline_map);

        Self {
            data: data_map,
            baseline: baseline_map,
        }
    }

    pub fn frame(&self, side: Side, frame: FrameId) -> Option<FrameId> {
        self.map(side).frames.get(frame.index()).copied()
    }

    pub fn path(&self, side: Side, path: CallPathId) -> Option<CallPathId> {
        self.map(side).paths.get(path.index()).copied()
    }

    fn map(&self, side: Side) -> &InputMap {
        match side {
            Side::Data => &self.data,
            Side::Baseline => &self.baseline,
        }
    }
}

fn remap_frames(source: &StackSource, builder: &mut StackSourceBuilder, map: &mut InputMap) {
    map.frames = source
        .frames()
        .iter()
        .map(|(_, frame)| builder.intern_frame(&frame.module, &frame.name))
        .collect();
}

fn remap_paths(source: &StackSource, builder: &mut StackSourceBuilder, map: &mut InputMap) {
    map.paths = Vec::with_capacity(source.call_paths().len());

    // Callers precede callees, so every caller is already translated.
    for (_, node) in source.call_paths().iter() {
        let frame = map.frames[node.frame.index()];
        let caller = node.caller.map(|caller| map.paths[caller.index()]);
        map.paths.push(builder.call_path(frame, caller));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_frames_get_one_id() {
        let mut data = StackSourceBuilder::new("d", "msec");
        data.add_stack(["main", "foo"], 1.0, 0.0, None);
        let data = data.build();

        let mut baseline = StackSourceBuilder::new("b", "msec");
        baseline.add_stack(["bar", "main"], 1.0, 0.0, None);
        let baseline = baseline.build();

        let mut builder = StackSourceBuilder::new("diff", "msec");
        let table = RemapTable::build(&data, &baseline, &mut builder);

        // data: main=0, foo=1; baseline: bar=0, main=1
        assert_eq!(table.frame(Side::Data, FrameId(0)), Some(FrameId(0)));
        assert_eq!(table.frame(Side::Baseline, FrameId(1)), Some(FrameId(0)));
        assert_eq!(table.frame(Side::Baseline, FrameId(0)), Some(FrameId(2)));
        assert_eq!(table.frame(Side::Data, FrameId(9)), None);
    }

    #[test]
    fn test_identical_paths_merge() {
        let mut data = StackSourceBuilder::new("d", "msec");
        data.add_stack(["main", "foo"], 1.0, 0.0, None);
        let data = data.build();

        let mut builder = StackSourceBuilder::new("diff", "msec");
        let table = RemapTable::build(&data, &data, &mut builder);

        assert_eq!(
            table.path(Side::Data, CallPathId(1)),
            table.path(Side::Baseline, CallPathId(1))
        );
    }
}
