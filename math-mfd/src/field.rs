//! Distributed multi-component fields
//!
//! A [`DistributedField`] holds named components living on cells or faces of
//! a [`Mesh`]. Every component stores owned rows first and ghost rows after,
//! one column per degree of freedom. Norms reduce over owned rows through the
//! mesh communicator; ghost rows are refreshed with
//! [`DistributedField::scatter_master_to_ghosted`].

use crate::error::{MfdError, Result};
use crate::mesh::Mesh;
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, s};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Mesh entity a component lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Cell,
    Face,
}

/// Name, location and width of one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    pub entity: Entity,
    pub num_dofs: usize,
}

/// Ordered list of components making up a field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    components: Vec<ComponentSpec>,
}

impl FieldLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component
    pub fn with_component(mut self, name: &str, entity: Entity, num_dofs: usize) -> Self {
        self.components.push(ComponentSpec {
            name: name.to_string(),
            entity,
            num_dofs,
        });
        self
    }

    /// The `"cell"` + `"face"` layout of the mixed-hybrid unknowns
    pub fn cell_face() -> Self {
        Self::new()
            .with_component("cell", Entity::Cell, 1)
            .with_component("face", Entity::Face, 1)
    }

    /// A single scalar component
    pub fn scalar(name: &str, entity: Entity) -> Self {
        Self::new().with_component(name, entity, 1)
    }

    pub fn components(&self) -> &[ComponentSpec] {
        &self.components
    }
}

/// One component of a field
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub entity: Entity,
    pub num_owned: usize,
    /// Owned rows first, then ghost rows; one column per dof
    pub data: Array2<f64>,
}

impl Component {
    pub fn num_dofs(&self) -> usize {
        self.data.ncols()
    }

    pub fn owned(&self) -> ArrayView2<'_, f64> {
        self.data.slice(s![..self.num_owned, ..])
    }
}

/// A field with named components over a rank-local mesh
#[derive(Debug, Clone)]
pub struct DistributedField {
    mesh: Arc<Mesh>,
    layout: FieldLayout,
    components: Vec<Component>,
}

impl DistributedField {
    /// Zero-initialised field with the given layout
    pub fn from_layout(mesh: Arc<Mesh>, layout: &FieldLayout) -> Self {
        let components = layout
            .components
            .iter()
            .map(|spec| {
                let (num_local, num_owned) = match spec.entity {
                    Entity::Cell => (mesh.num_cells(), mesh.num_owned_cells()),
                    Entity::Face => (mesh.num_faces(), mesh.num_owned_faces()),
                };
                Component {
                    entity: spec.entity,
                    num_owned,
                    data: Array2::zeros((num_local, spec.num_dofs)),
                }
            })
            .collect();
        Self {
            mesh,
            layout: layout.clone(),
            components,
        }
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.layout.components.iter().position(|c| c.name == name)
    }

    pub fn component(&self, name: &str) -> Result<&Component> {
        self.position(name)
            .map(|i| &self.components[i])
            .ok_or_else(|| MfdError::MissingComponent(name.to_string()))
    }

    pub fn component_mut(&mut self, name: &str) -> Result<&mut Component> {
        match self.position(name) {
            Some(i) => Ok(&mut self.components[i]),
            None => Err(MfdError::MissingComponent(name.to_string())),
        }
    }

    /// All rows (owned + ghost)
    pub fn view(&self, name: &str) -> Result<ArrayView2<'_, f64>> {
        Ok(self.component(name)?.data.view())
    }

    pub fn view_mut(&mut self, name: &str) -> Result<ArrayViewMut2<'_, f64>> {
        Ok(self.component_mut(name)?.data.view_mut())
    }

    /// Owned rows only
    pub fn owned(&self, name: &str) -> Result<ArrayView2<'_, f64>> {
        Ok(self.component(name)?.owned())
    }

    pub fn owned_mut(&mut self, name: &str) -> Result<ArrayViewMut2<'_, f64>> {
        let comp = self.component_mut(name)?;
        let n = comp.num_owned;
        Ok(comp.data.slice_mut(s![..n, ..]))
    }

    /// First dof of a component, all rows
    pub fn scalar(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        Ok(self.component(name)?.data.column(0))
    }

    pub fn scalar_mut(&mut self, name: &str) -> Result<ArrayViewMut1<'_, f64>> {
        Ok(self.component_mut(name)?.data.column_mut(0))
    }

    /// Set every entry (owned and ghost) of every component
    pub fn put_scalar(&mut self, value: f64) {
        for comp in &mut self.components {
            comp.data.fill(value);
        }
    }

    /// `self = alpha * other + beta * self`, ghost rows included
    pub fn update(&mut self, alpha: f64, other: &DistributedField, beta: f64) -> Result<()> {
        self.check_compatible(other)?;
        for (mine, theirs) in self.components.iter_mut().zip(&other.components) {
            mine.data.zip_mut_with(&theirs.data, |a, &b| *a = alpha * b + beta * *a);
        }
        Ok(())
    }

    /// Copy values from a field with the same layout
    pub fn assign(&mut self, other: &DistributedField) -> Result<()> {
        self.check_compatible(other)?;
        for (mine, theirs) in self.components.iter_mut().zip(&other.components) {
            mine.data.assign(&theirs.data);
        }
        Ok(())
    }

    fn check_compatible(&self, other: &DistributedField) -> Result<()> {
        for (mine, theirs) in self.components.iter().zip(&other.components) {
            if mine.data.dim() != theirs.data.dim() {
                return Err(MfdError::DimensionMismatch {
                    what: "field component",
                    expected: mine.data.len(),
                    actual: theirs.data.len(),
                });
            }
        }
        if self.components.len() != other.components.len() {
            return Err(MfdError::DimensionMismatch {
                what: "field components",
                expected: self.components.len(),
                actual: other.components.len(),
            });
        }
        Ok(())
    }

    /// Global max-norm over owned rows of all components; collective
    pub fn norm_inf(&self) -> f64 {
        let local = self
            .components
            .iter()
            .map(|c| c.owned().fold(0.0_f64, |m, v| m.max(v.abs())))
            .fold(0.0_f64, f64::max);
        self.mesh.comm().max_all(local)
    }

    /// Global 2-norm over owned rows of all components; collective
    pub fn norm2(&self) -> f64 {
        let local: f64 = self
            .components
            .iter()
            .map(|c| c.owned().iter().map(|v| v * v).sum::<f64>())
            .sum();
        self.mesh.comm().sum_all(local).sqrt()
    }

    /// Refresh ghost rows of one component from their owners; collective
    pub fn scatter_master_to_ghosted(&mut self, name: &str) -> Result<()> {
        let mesh = Arc::clone(&self.mesh);
        let comp = self.component_mut(name)?;
        let importer = match comp.entity {
            Entity::Cell => mesh.cell_importer(),
            Entity::Face => mesh.face_importer(),
        };
        importer.scatter(mesh.comm(), &mut comp.data);
        Ok(())
    }

    /// Refresh ghost rows of every component; collective
    pub fn scatter_all(&mut self) -> Result<()> {
        let names: Vec<String> = self.layout.components.iter().map(|c| c.name.clone()).collect();
        for name in names {
            self.scatter_master_to_ghosted(&name)?;
        }
        Ok(())
    }

    /// Sum of a component's owned rows along the dof axis; used for diagnostics
    pub fn owned_sum(&self, name: &str) -> Result<f64> {
        let local = self.owned(name)?.sum_axis(Axis(1)).sum();
        Ok(self.mesh.comm().sum_all(local))
    }
}
