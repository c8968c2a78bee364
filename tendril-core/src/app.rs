//! Boot: find the roots of a document and bind them.

use crate::config::Config;
use crate::directive::{DirectiveError, Walker};
use crate::dom::{Document, Element};
use crate::error::Result;
use crate::expr::{Extras, Function, Program, Scope};
use crate::reactive::{Observable, Runtime};
use crate::value::Value;

/// What a data declaration evaluated to.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A value used as the seed object directly.
    Static(Value),
    /// A function called once, with no arguments, to produce the seed.
    Factory(Function),
}

impl DataSource {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Function(factory) => DataSource::Factory(factory),
            other => DataSource::Static(other),
        }
    }

    /// The seed value. Factories are called here.
    pub fn resolve(self) -> Result<Value> {
        match self {
            DataSource::Static(value) => Ok(value),
            DataSource::Factory(factory) => Ok(factory.call(&[])?),
        }
    }
}

/// A bound root element and its reactive data.
#[derive(Debug, Clone)]
pub struct MountedRoot {
    pub element: Element,
    pub data: Observable,
}

/// A set of bound roots sharing one runtime.
#[derive(Debug)]
pub struct App {
    runtime: Runtime,
    walker: Walker,
    roots: Vec<MountedRoot>,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let runtime = Runtime::with_config(config);
        Self {
            walker: Walker::new(runtime.clone()),
            runtime,
            roots: Vec::new(),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Bind every element under `root` (including `root` itself) that
    /// carries a data declaration, in document order. A root whose
    /// declaration fails is reported and skipped; the others still mount.
    ///
    /// Returns the number of roots mounted by this call.
    pub fn mount(&mut self, root: &Element) -> usize {
        let attribute = self.walker.data_attribute();
        let mut mounted = 0;

        for element in root.query_all_with_attribute(&attribute) {
            let declaration = element.attribute(&attribute).unwrap_or_default();
            match self.seed(&declaration) {
                Ok(data) => {
                    self.walker
                        .walk(&element, &Scope::new(data.clone()), &Extras::new());
                    tracing::debug!(tag = element.tag(), %declaration, "mounted root");
                    self.roots.push(MountedRoot { element, data });
                    mounted += 1;
                }
                Err(error) => self.runtime.report(error),
            }
        }

        mounted
    }

    /// Evaluate a data declaration into the root's observed object.
    /// An empty declaration yields an empty object.
    fn seed(&self, declaration: &str) -> Result<Observable> {
        let value = if declaration.trim().is_empty() {
            Value::Undefined
        } else {
            let program = Program::parse(declaration)?;
            let scope = Scope::empty(self.runtime.clone());
            self.runtime
                .untracked(|| program.eval(&scope, &Extras::new()))?
        };

        let value = self
            .runtime
            .untracked(|| DataSource::from_value(value).resolve())?;

        match self.runtime.wrap(value) {
            Value::Undefined => Ok(self.runtime.object(std::iter::empty())),
            Value::Object(data) if !data.is_array() => Ok(data),
            other => Err(DirectiveError::DataNotObject {
                found: other.type_name(),
            }
            .into()),
        }
    }

    pub fn roots(&self) -> &[MountedRoot] {
        &self.roots
    }

    /// Data object of the `index`-th mounted root.
    pub fn data(&self, index: usize) -> Option<&Observable> {
        self.roots.get(index).map(|root| &root.data)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Mount every root of `document` with the default configuration.
pub fn start(document: &Document) -> App {
    let mut app = App::new();
    app.mount(document.root());
    app
}
