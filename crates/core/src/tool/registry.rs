use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use shelf_agent_model::ModelTool;

use crate::tool::{AnyTool, Tool, ToolObject};

/// Returned when a tool is registered under a name that is already taken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateToolError(pub String);

impl Display for DuplicateToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duplicate tool name: {}", self.0)
    }
}

impl StdError for DuplicateToolError {}

/// An object that owns the toolset, keyed by tool name.
///
/// Tools keep their registration order, which is also the order in which
/// they are advertised to the model.
#[derive(Default)]
pub struct Registry {
    tools: Vec<Box<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Registers a tool. Names must be unique.
    pub fn add_tool<T: Tool>(&mut self, tool: T) -> Result<(), DuplicateToolError> {
        let name = tool.name().to_owned();
        if self.index.contains_key(&name) {
            return Err(DuplicateToolError(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(Box::new(AnyTool(tool)));
        Ok(())
    }

    #[inline]
    pub(crate) fn get(&self, name: &str) -> Option<&dyn ToolObject> {
        self.index.get(name).map(|&idx| self.tools[idx].as_ref())
    }

    /// Looks up the definition of a tool.
    #[inline]
    pub fn definition(&self, name: &str) -> Option<ModelTool> {
        self.get(name).map(definition_of)
    }

    /// Returns the manifest of all registered tools.
    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools.iter().map(|tool| definition_of(tool.as_ref())).collect()
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn definition_of(tool: &dyn ToolObject) -> ModelTool {
    ModelTool {
        name: tool.name().to_owned(),
        description: tool.description().to_owned(),
        parameters: tool.parameter_schema().clone(),
    }
}
