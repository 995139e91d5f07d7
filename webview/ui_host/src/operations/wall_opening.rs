use super::mm_to_feet;
use crate::document::{ElementKind, WallFrame, Xyz};
use crate::model_host::ModelHost;
use flowbridge_host_runtime::{
    ExternalHandler, HandlerError, HostApplication, Notice, Transaction,
};

pub const REQUEST_NAME: &str = "wallOpening";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeningShape {
    Rectangle,
    Circle,
}

impl OpeningShape {
    /// Anything other than `circle` cuts a rectangle.
    pub fn from_name(name: &str) -> Self {
        if name == "circle" {
            Self::Circle
        } else {
            Self::Rectangle
        }
    }
}

/// Opening dimensions in millimetres.
#[derive(Debug, Clone, PartialEq)]
pub struct WallOpeningParams {
    pub width: f64,
    pub height: f64,
    pub sill_height: f64,
    pub radius: f64,
    pub shape: OpeningShape,
}

impl WallOpeningParams {
    fn validate(&self) -> Result<(), HandlerError> {
        let (label, value) = match self.shape {
            OpeningShape::Rectangle if self.width <= 0.0 => ("width", self.width),
            OpeningShape::Rectangle if self.height <= 0.0 => ("height", self.height),
            OpeningShape::Circle if self.radius <= 0.0 => ("radius", self.radius),
            _ if self.sill_height < 0.0 => ("sill height", self.sill_height),
            _ => return Ok(()),
        };
        Err(HandlerError::Failed(format!("invalid opening {label}: {value}")))
    }
}

/// Diagonal corners, in feet, of the opening centred on `point`.
/// Circles are cut as the square that bounds them.
pub fn opening_corners(params: &WallOpeningParams, frame: &WallFrame, point: Xyz) -> (Xyz, Xyz) {
    let sill = mm_to_feet(params.sill_height);
    let (half_width, bottom, top) = match params.shape {
        OpeningShape::Rectangle => {
            let bottom = frame.base_elevation + sill;
            (mm_to_feet(params.width) / 2.0, bottom, bottom + mm_to_feet(params.height))
        }
        OpeningShape::Circle => {
            let diameter = mm_to_feet(params.radius * 2.0);
            let half = diameter / 2.0;
            let center_z = frame.base_elevation + sill + half;
            (half, center_z - half, center_z + half)
        }
    };

    let along = frame.direction.scale(half_width);
    (
        Xyz::new(point.x - along.x, point.y - along.y, bottom),
        Xyz::new(point.x + along.x, point.y + along.y, top),
    )
}

#[derive(Debug, Default)]
pub struct WallOpeningHandler;

impl ExternalHandler<ModelHost> for WallOpeningHandler {
    type Params = WallOpeningParams;

    fn name(&self) -> &'static str {
        REQUEST_NAME
    }

    fn execute(
        &mut self,
        app: &mut ModelHost,
        params: &WallOpeningParams,
    ) -> Result<(), HandlerError> {
        app.active_document()?;
        params.validate()?;
        tracing::info!(
            shape = ?params.shape,
            width = params.width,
            height = params.height,
            radius = params.radius,
            sill_height = params.sill_height,
            "creating wall opening"
        );

        let wall = app.pick_element(ElementKind::Wall, "Select the wall to cut")?;
        let point = app.pick_point("Pick the centre of the opening")?;

        let document = app.active_document_mut()?;
        let frame = document.wall_frame(wall)?;
        let (corner_a, corner_b) = opening_corners(params, &frame, point);

        let mut tx = Transaction::start(document, "Create wall opening")?;
        let opening = tx.create_opening(wall, corner_a, corner_b)?;
        tx.commit()?;

        tracing::info!(wall = wall.0, opening = opening.0, "wall opening created");
        app.notify(Notice::info("Wall opening", "Opening created."));
        Ok(())
    }
}
