//! Stream table: molar flows by stream and component.

use std::fmt::Write;

use fs_model::{Assignment, EntityModel, ModelResult, SliceEnv};
use serde::Serialize;

use crate::display_value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRow {
    pub name: String,
    pub fixed: bool,
    pub total: f64,
    /// Component flows in component order.
    pub flows: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamTable {
    pub components: Vec<String>,
    pub rows: Vec<StreamRow>,
}

impl StreamTable {
    /// Flows of every stream at `values`. Fixed streams read their parameters.
    pub fn build(model: &EntityModel, values: &Assignment) -> ModelResult<Self> {
        let params = model.param_values();
        let env = SliceEnv {
            vars: values.as_slice(),
            params: &params,
        };
        let mut rows = Vec::new();
        for stream in model.streams() {
            let total = model.total_flow(stream.id)?.eval(&env);
            let flows = model
                .components()
                .iter()
                .map(|c| Ok(display_value(model.component_flow(stream.id, c.id)?.eval(&env))))
                .collect::<ModelResult<Vec<f64>>>()?;
            rows.push(StreamRow {
                name: stream.name.clone(),
                fixed: stream.is_fixed(),
                total: display_value(total),
                flows,
            });
        }
        Ok(Self {
            components: model.components().iter().map(|c| c.name.clone()).collect(),
            rows,
        })
    }

    pub fn row(&self, stream: &str) -> Option<&StreamRow> {
        self.rows.iter().find(|r| r.name == stream)
    }

    /// Flow of `component` in `stream`, as displayed.
    pub fn flow(&self, stream: &str, component: &str) -> Option<f64> {
        let c = self.components.iter().position(|n| n == component)?;
        self.row(stream).map(|r| r.flows[c])
    }

    /// Plain-text table, one line per component plus a total line.
    pub fn render(&self) -> String {
        let label_width = self
            .components
            .iter()
            .map(String::len)
            .chain(["Total".len()])
            .max()
            .unwrap_or(5);
        let col_width = self
            .rows
            .iter()
            .map(|r| r.name.len())
            .chain([12])
            .max()
            .unwrap_or(12);

        let mut out = String::new();
        let _ = write!(out, "{:<label_width$}", "");
        for row in &self.rows {
            let _ = write!(out, "  {:>col_width$}", row.name);
        }
        out.push('\n');
        for (i, component) in self.components.iter().enumerate() {
            let _ = write!(out, "{component:<label_width$}");
            for row in &self.rows {
                let _ = write!(out, "  {:>col_width$.4}", row.flows[i]);
            }
            out.push('\n');
        }
        let _ = write!(out, "{:<label_width$}", "Total");
        for row in &self.rows {
            let _ = write!(out, "  {:>col_width$.4}", row.total);
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_model::{CompositionBasis, StreamInit, StreamSpec};

    fn model() -> EntityModel {
        let mut m = EntityModel::new();
        m.declare_component("A").unwrap();
        m.declare_component("B").unwrap();
        m.declare_stream(StreamSpec::fixed("feed", 100.0, &[("A", 0.6), ("B", 0.4)]))
            .unwrap();
        m.declare_stream(StreamSpec::free(
            "out",
            CompositionBasis::Fractions,
            StreamInit::uniform(0.0, 0.0),
        ))
        .unwrap();
        m
    }

    #[test]
    fn fixed_and_fraction_streams_report_flows() {
        let m = model();
        let mut values = m.initial_assignment();
        values.set(m.variable("out.F").unwrap(), 50.0);
        values.set(m.variable("out.x[A]").unwrap(), 0.2);
        values.set(m.variable("out.x[B]").unwrap(), 0.8);

        let table = StreamTable::build(&m, &values).unwrap();
        assert_eq!(table.flow("feed", "A"), Some(60.0));
        assert!((table.flow("out", "A").unwrap() - 10.0).abs() < 1e-12);
        assert!((table.flow("out", "B").unwrap() - 40.0).abs() < 1e-12);
        assert!(table.row("feed").unwrap().fixed);
    }

    #[test]
    fn unsolved_values_render_as_zero() {
        let m = model();
        let mut values = m.initial_assignment();
        values.set(m.variable("out.F").unwrap(), f64::NAN);
        values.set(m.variable("out.x[A]").unwrap(), -0.1);

        let table = StreamTable::build(&m, &values).unwrap();
        assert_eq!(table.row("out").unwrap().total, 0.0);
        assert_eq!(table.flow("out", "A"), Some(0.0));

        let text = table.render();
        assert!(text.lines().next().unwrap().contains("feed"));
        assert!(text.contains("60.0000"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn table_serializes_to_json() {
        let m = model();
        let table = StreamTable::build(&m, &m.initial_assignment()).unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["components"][1], "B");
        assert_eq!(json["rows"][0]["name"], "feed");
    }
}
