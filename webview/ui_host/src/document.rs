//! In-memory stand-in for the host's document model.
//!
//! Lengths are in feet, like the host's internal units. All mutation goes
//! through an open transaction; rollback restores the snapshot taken when
//! the transaction began.

use flowbridge_host_runtime::{Document, HostError, Transaction};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Xyz {
    pub const ZERO: Xyz = Xyz::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Xyz) -> Xyz {
        Xyz::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Xyz) -> Xyz {
        Xyz::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, factor: f64) -> Xyz {
        Xyz::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(self) -> Option<Xyz> {
        let length = self.length();
        (length > f64::EPSILON).then(|| self.scale(1.0 / length))
    }

    pub fn min(self, other: Xyz) -> Xyz {
        Xyz::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Xyz) -> Xyz {
        Xyz::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    GenericModel,
    Furniture,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CurveGeometry {
    Line { start: Xyz, end: Xyz },
    /// Horizontal arc; angles in radians, counter-clockwise from +X.
    Arc {
        center: Xyz,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
}

impl CurveGeometry {
    /// Point at normalized parameter `t` in `[0, 1]`.
    pub fn evaluate(&self, t: f64) -> Xyz {
        match self {
            CurveGeometry::Line { start, end } => start.add(end.sub(*start).scale(t)),
            CurveGeometry::Arc {
                center,
                radius,
                start_angle,
                end_angle,
            } => {
                let angle = start_angle + (end_angle - start_angle) * t;
                center.add(Xyz::new(radius * angle.cos(), radius * angle.sin(), 0.0))
            }
        }
    }

    pub fn tangent(&self, t: f64) -> Xyz {
        let raw = match self {
            CurveGeometry::Line { start, end } => end.sub(*start),
            CurveGeometry::Arc {
                start_angle,
                end_angle,
                ..
            } => {
                let angle = start_angle + (end_angle - start_angle) * t;
                let sweep = (end_angle - start_angle).signum();
                Xyz::new(-angle.sin() * sweep, angle.cos() * sweep, 0.0)
            }
        };
        raw.normalize().unwrap_or(Xyz::new(1.0, 0.0, 0.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Level {
        name: String,
        elevation: f64,
    },
    Wall {
        start: Xyz,
        end: Xyz,
        level: ElementId,
    },
    ModelCurve(CurveGeometry),
    FamilySymbol {
        family: String,
        name: String,
        category: Category,
        active: bool,
    },
    Opening {
        wall: ElementId,
        min: Xyz,
        max: Xyz,
    },
    FamilyInstance {
        symbol: ElementId,
        location: Xyz,
        rotation: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Level,
    Wall,
    ModelCurve,
    FamilySymbol,
    Opening,
    FamilyInstance,
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Level { .. } => ElementKind::Level,
            Element::Wall { .. } => ElementKind::Wall,
            Element::ModelCurve(_) => ElementKind::ModelCurve,
            Element::FamilySymbol { .. } => ElementKind::FamilySymbol,
            Element::Opening { .. } => ElementKind::Opening,
            Element::FamilyInstance { .. } => ElementKind::FamilyInstance,
        }
    }
}

/// Wall direction and base elevation, as needed to place an opening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallFrame {
    pub direction: Xyz,
    pub base_elevation: f64,
}

struct OpenTransaction {
    name: String,
    elements: BTreeMap<ElementId, Element>,
    next_id: u64,
}

pub struct ModelDocument {
    title: String,
    elements: BTreeMap<ElementId, Element>,
    next_id: u64,
    open: Option<OpenTransaction>,
    committed: Vec<String>,
}

impl ModelDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            elements: BTreeMap::new(),
            next_id: 1,
            open: None,
            committed: Vec::new(),
        }
    }

    /// A small project with one level, two walls, two model curves and a
    /// few family types.
    pub fn sample() -> Result<Self, HostError> {
        let mut document = Self::new("Sample Project");
        let mut tx = Transaction::start(&mut document, "Seed sample project")?;

        let level = tx.add_level("Level 1", 0.0)?;
        tx.add_wall(Xyz::new(0.0, 0.0, 0.0), Xyz::new(30.0, 0.0, 0.0), level)?;
        tx.add_wall(Xyz::new(30.0, 0.0, 0.0), Xyz::new(30.0, 20.0, 0.0), level)?;
        tx.add_model_curve(CurveGeometry::Line {
            start: Xyz::new(0.0, 10.0, 0.0),
            end: Xyz::new(20.0, 10.0, 0.0),
        })?;
        tx.add_model_curve(CurveGeometry::Arc {
            center: Xyz::new(10.0, 30.0, 0.0),
            radius: 8.0,
            start_angle: 0.0,
            end_angle: std::f64::consts::PI,
        })?;
        tx.add_family_symbol("Bollard", "600mm", Category::GenericModel)?;
        tx.add_family_symbol("Bollard", "900mm", Category::GenericModel)?;
        tx.add_family_symbol("Planter", "Round", Category::GenericModel)?;
        tx.add_family_symbol("Bench", "Standard", Category::Furniture)?;

        tx.commit()?;
        Ok(document)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn elements_of(&self, kind: ElementKind) -> impl Iterator<Item = (ElementId, &Element)> {
        self.elements
            .iter()
            .filter(move |(_, element)| element.kind() == kind)
            .map(|(id, element)| (*id, element))
    }

    pub fn count(&self, kind: ElementKind) -> usize {
        self.elements_of(kind).count()
    }

    /// Names of committed transactions, oldest first.
    pub fn history(&self) -> &[String] {
        &self.committed
    }

    pub fn in_transaction(&self) -> bool {
        self.open.is_some()
    }

    pub fn add_level(&mut self, name: &str, elevation: f64) -> Result<ElementId, HostError> {
        self.insert(Element::Level {
            name: name.to_string(),
            elevation,
        })
    }

    pub fn add_wall(
        &mut self,
        start: Xyz,
        end: Xyz,
        level: ElementId,
    ) -> Result<ElementId, HostError> {
        self.expect_kind(level, ElementKind::Level)?;
        if end.sub(start).normalize().is_none() {
            return Err(HostError::Rejected("wall has zero length".to_string()));
        }
        self.insert(Element::Wall { start, end, level })
    }

    pub fn add_model_curve(&mut self, geometry: CurveGeometry) -> Result<ElementId, HostError> {
        self.insert(Element::ModelCurve(geometry))
    }

    pub fn add_family_symbol(
        &mut self,
        family: &str,
        name: &str,
        category: Category,
    ) -> Result<ElementId, HostError> {
        self.insert(Element::FamilySymbol {
            family: family.to_string(),
            name: name.to_string(),
            category,
            active: false,
        })
    }

    pub fn create_opening(
        &mut self,
        wall: ElementId,
        corner_a: Xyz,
        corner_b: Xyz,
    ) -> Result<ElementId, HostError> {
        self.expect_kind(wall, ElementKind::Wall)?;
        let min = corner_a.min(corner_b);
        let max = corner_a.max(corner_b);
        let extent = max.sub(min);
        if extent.z <= f64::EPSILON || Xyz::new(extent.x, extent.y, 0.0).length() <= f64::EPSILON {
            return Err(HostError::Rejected("opening has no area".to_string()));
        }
        self.insert(Element::Opening { wall, min, max })
    }

    pub fn activate_symbol(&mut self, symbol: ElementId) -> Result<(), HostError> {
        self.expect_kind(symbol, ElementKind::FamilySymbol)?;
        self.require_transaction()?;
        if let Some(Element::FamilySymbol { active, .. }) = self.elements.get_mut(&symbol) {
            *active = true;
        }
        Ok(())
    }

    pub fn place_instance(
        &mut self,
        symbol: ElementId,
        location: Xyz,
    ) -> Result<ElementId, HostError> {
        match self.elements.get(&symbol) {
            Some(Element::FamilySymbol { active: true, .. }) => {}
            Some(Element::FamilySymbol { active: false, .. }) => {
                return Err(HostError::Rejected("family symbol is not active".to_string()));
            }
            _ => {
                return Err(HostError::Rejected(format!(
                    "element {} is not a family symbol",
                    symbol.0
                )));
            }
        }
        self.insert(Element::FamilyInstance {
            symbol,
            location,
            rotation: 0.0,
        })
    }

    /// Rotates an instance about the vertical axis through its location.
    pub fn rotate_element(&mut self, id: ElementId, angle: f64) -> Result<(), HostError> {
        self.require_transaction()?;
        match self.elements.get_mut(&id) {
            Some(Element::FamilyInstance { rotation, .. }) => {
                *rotation += angle;
                Ok(())
            }
            _ => Err(HostError::Rejected(format!("element {} cannot be rotated", id.0))),
        }
    }

    /// `"Family : Type"` for every generic-model symbol, sorted, no duplicates.
    pub fn family_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .elements
            .values()
            .filter_map(|element| match element {
                Element::FamilySymbol {
                    family,
                    name,
                    category: Category::GenericModel,
                    ..
                } => Some(format!("{family} : {name}")),
                _ => None,
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn find_symbol(&self, family: &str, type_name: &str) -> Option<ElementId> {
        self.elements.iter().find_map(|(id, element)| match element {
            Element::FamilySymbol {
                family: f, name, ..
            } if f == family && name == type_name => Some(*id),
            _ => None,
        })
    }

    pub fn wall_frame(&self, wall: ElementId) -> Result<WallFrame, HostError> {
        let (start, end, level) = match self.elements.get(&wall) {
            Some(Element::Wall { start, end, level }) => (*start, *end, *level),
            _ => return Err(HostError::Rejected(format!("element {} is not a wall", wall.0))),
        };
        let base_elevation = match self.elements.get(&level) {
            Some(Element::Level { elevation, .. }) => *elevation,
            _ => return Err(HostError::Rejected("wall has no level".to_string())),
        };
        let direction = end
            .sub(start)
            .normalize()
            .ok_or_else(|| HostError::Rejected("wall has zero length".to_string()))?;

        Ok(WallFrame {
            direction,
            base_elevation,
        })
    }

    pub fn wall_midpoint(&self, wall: ElementId) -> Option<Xyz> {
        match self.elements.get(&wall) {
            Some(Element::Wall { start, end, .. }) => Some(start.add(*end).scale(0.5)),
            _ => None,
        }
    }

    pub fn model_curve(&self, id: ElementId) -> Result<&CurveGeometry, HostError> {
        match self.elements.get(&id) {
            Some(Element::ModelCurve(geometry)) => Ok(geometry),
            _ => Err(HostError::Rejected(format!("element {} is not a model curve", id.0))),
        }
    }

    fn expect_kind(&self, id: ElementId, kind: ElementKind) -> Result<(), HostError> {
        match self.elements.get(&id) {
            Some(element) if element.kind() == kind => Ok(()),
            _ => Err(HostError::Rejected(format!("element {} is not a {kind:?}", id.0))),
        }
    }

    fn require_transaction(&self) -> Result<(), HostError> {
        if self.open.is_some() {
            Ok(())
        } else {
            Err(HostError::NoTransaction)
        }
    }

    fn insert(&mut self, element: Element) -> Result<ElementId, HostError> {
        self.require_transaction()?;
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(id, element);
        Ok(id)
    }
}

impl Document for ModelDocument {
    fn begin_transaction(&mut self, name: &str) -> Result<(), HostError> {
        if let Some(open) = &self.open {
            return Err(HostError::TransactionOpen(open.name.clone()));
        }
        self.open = Some(OpenTransaction {
            name: name.to_string(),
            elements: self.elements.clone(),
            next_id: self.next_id,
        });
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), HostError> {
        let open = self.open.take().ok_or(HostError::NoTransaction)?;
        tracing::debug!(transaction = %open.name, "transaction committed");
        self.committed.push(open.name);
        Ok(())
    }

    fn rollback_transaction(&mut self) {
        if let Some(open) = self.open.take() {
            tracing::debug!(transaction = %open.name, "transaction rolled back");
            self.elements = open.elements;
            self.next_id = open.next_id;
        }
    }
}
