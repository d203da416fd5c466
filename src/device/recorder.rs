use super::{Capability, Device, DisplayLists, DrawCommand, ListHandle, PolygonMode};

/// Aggregate counters over everything a [`CommandRecorder`] executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub commands: usize,
    pub pushes: usize,
    pub pops: usize,
    pub max_depth: usize,
    /// Pops issued on an empty transform stack
    pub underflows: usize,
    pub triangles: usize,
    pub vertices: usize,
    pub list_calls: usize,
}

/// Headless device that records every executed command
///
/// `CallList` is logged and then expanded in place, so the log reads like the
/// immediate command stream the lists stand for. Commands captured while
/// compiling a list are not logged until the list is called.
#[derive(Debug, Default)]
pub struct CommandRecorder {
    log: Vec<DrawCommand>,
    lists: DisplayLists,
    depth: usize,
    stats: DrawStats,
    vertices_in_batch: usize,
    polygon_mode: PolygonMode,
    attrib_stack: Vec<PolygonMode>,
    /// Polygon mode in effect at each `BeginTriangles`
    batch_modes: Vec<PolygonMode>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder whose display list allocation fails past `capacity` live lists
    pub fn with_list_capacity(capacity: usize) -> Self {
        Self {
            lists: DisplayLists::with_capacity(Some(capacity)),
            ..Self::default()
        }
    }

    /// Executed commands in order
    pub fn commands(&self) -> &[DrawCommand] {
        &self.log
    }

    /// Number of logged commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        self.log.iter().filter(|c| predicate(c)).count()
    }

    /// Number of times `capability` was enabled
    pub fn enable_count(&self, capability: Capability) -> usize {
        self.count(|c| *c == DrawCommand::Enable(capability))
    }

    pub fn stats(&self) -> DrawStats {
        self.stats
    }

    /// Current transform stack depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn lists(&self) -> &DisplayLists {
        &self.lists
    }

    /// Polygon mode currently in effect
    pub fn current_polygon_mode(&self) -> PolygonMode {
        self.polygon_mode
    }

    /// Polygon mode each triangle batch was drawn with, in order
    pub fn batch_modes(&self) -> &[PolygonMode] {
        &self.batch_modes
    }

    /// Forget the command log and counters, keeping compiled lists
    pub fn clear_log(&mut self) {
        self.log.clear();
        self.stats = DrawStats::default();
        self.depth = 0;
        self.vertices_in_batch = 0;
        self.polygon_mode = PolygonMode::Fill;
        self.attrib_stack.clear();
        self.batch_modes.clear();
    }

    fn track(&mut self, command: &DrawCommand) {
        self.stats.commands += 1;
        match command {
            DrawCommand::PushMatrix => {
                self.stats.pushes += 1;
                self.depth += 1;
                self.stats.max_depth = self.stats.max_depth.max(self.depth);
            }
            DrawCommand::PopMatrix => {
                self.stats.pops += 1;
                if self.depth == 0 {
                    log::warn!("transform stack underflow");
                    self.stats.underflows += 1;
                } else {
                    self.depth -= 1;
                }
            }
            DrawCommand::PolygonMode(mode) => self.polygon_mode = *mode,
            DrawCommand::PushAttrib => self.attrib_stack.push(self.polygon_mode),
            DrawCommand::PopAttrib => match self.attrib_stack.pop() {
                Some(mode) => self.polygon_mode = mode,
                None => log::warn!("attribute stack underflow"),
            },
            DrawCommand::BeginTriangles => {
                self.vertices_in_batch = 0;
                self.batch_modes.push(self.polygon_mode);
            }
            DrawCommand::Vertex(_) => {
                self.stats.vertices += 1;
                self.vertices_in_batch += 1;
                if self.vertices_in_batch % 3 == 0 {
                    self.stats.triangles += 1;
                }
            }
            DrawCommand::CallList(_) => self.stats.list_calls += 1,
            _ => {}
        }
    }
}

impl Device for CommandRecorder {
    fn execute(&mut self, command: DrawCommand) {
        let Some(command) = self.lists.capture(command) else {
            return;
        };

        self.track(&command);
        let replay = match &command {
            DrawCommand::CallList(handle) => self.lists.commands(*handle),
            _ => None,
        };
        self.log.push(command);

        if let Some(replay) = replay {
            for command in replay.iter() {
                self.execute(command.clone());
            }
        }
    }

    fn gen_list(&mut self) -> ListHandle {
        self.lists.generate()
    }

    fn begin_list(&mut self, handle: ListHandle) {
        self.lists.begin(handle);
    }

    fn end_list(&mut self) {
        self.lists.end();
    }

    fn delete_list(&mut self, handle: ListHandle) {
        self.lists.delete(handle);
    }
}
