use crate::document::{CurveGeometry, ElementKind, Xyz};
use crate::model_host::ModelHost;
use flowbridge_host_runtime::{
    ExternalHandler, HandlerError, HostApplication, Notice, Transaction,
};

pub const REQUEST_NAME: &str = "curveArray";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurveArrayParams {
    /// `"Family : Type"`, as listed by the document.
    pub family_type: String,
    pub count: i32,
    pub align_to_path: bool,
}

/// Splits `"Family : Type"` into its trimmed halves.
pub fn parse_family_type(raw: &str) -> Option<(&str, &str)> {
    let mut parts = raw.split(" : ");
    let family = parts.next()?.trim();
    let type_name = parts.next()?.trim();
    if parts.next().is_some() || family.is_empty() || type_name.is_empty() {
        return None;
    }
    Some((family, type_name))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub location: Xyz,
    pub rotation: Option<f64>,
}

/// Evenly spaced placements from one end of the curve to the other; a
/// single instance sits at the midpoint.
pub fn array_placements(
    curve: &CurveGeometry,
    count: usize,
    align_to_path: bool,
) -> Vec<Placement> {
    (0..count)
        .map(|i| {
            let t = if count == 1 {
                0.5
            } else {
                i as f64 / (count - 1) as f64
            };
            let rotation = align_to_path.then(|| {
                let tangent = curve.tangent(t);
                tangent.y.atan2(tangent.x)
            });
            Placement {
                location: curve.evaluate(t),
                rotation,
            }
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct CurveArrayHandler;

impl ExternalHandler<ModelHost> for CurveArrayHandler {
    type Params = CurveArrayParams;

    fn name(&self) -> &'static str {
        REQUEST_NAME
    }

    fn execute(
        &mut self,
        app: &mut ModelHost,
        params: &CurveArrayParams,
    ) -> Result<(), HandlerError> {
        let document = app.active_document()?;
        tracing::info!(
            family_type = %params.family_type,
            count = params.count,
            align_to_path = params.align_to_path,
            "arraying family along curve"
        );

        let symbol = parse_family_type(&params.family_type)
            .and_then(|(family, type_name)| document.find_symbol(family, type_name))
            .ok_or_else(|| {
                HandlerError::Failed(format!("family type not found: {}", params.family_type))
            })?;
        let count = usize::try_from(params.count)
            .ok()
            .filter(|count| *count > 0)
            .ok_or_else(|| {
                HandlerError::Failed(format!("invalid instance count: {}", params.count))
            })?;

        let curve_id = app.pick_element(ElementKind::ModelCurve, "Select a model curve")?;

        let document = app.active_document_mut()?;
        let placements =
            array_placements(document.model_curve(curve_id)?, count, params.align_to_path);

        let mut tx = Transaction::start(document, "Array family along curve")?;
        tx.activate_symbol(symbol)?;
        for placement in &placements {
            let instance = tx.place_instance(symbol, placement.location)?;
            if let Some(angle) = placement.rotation {
                tx.rotate_element(instance, angle)?;
            }
        }
        tx.commit()?;

        app.notify(Notice::info(
            "Curve array",
            format!("Placed {count} family instances along the curve."),
        ));
        Ok(())
    }
}
