use crate::literal::{Lit, Var};
use std::ops::{Index, IndexMut};

/// Wrapper around a `Vec` that is indexed by [`Var`].
#[derive(Debug, Clone)]
pub(crate) struct VarVec<T>(Vec<T>);

impl<T: Default> VarVec<T> {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.0.resize_with(count, Default::default);
    }
}

impl<T> Default for VarVec<T> {
    fn default() -> Self {
        Self(Vec::default())
    }
}

impl<T> Index<Var> for VarVec<T> {
    type Output = T;

    fn index(&self, index: Var) -> &Self::Output {
        &self.0[index.as_index()]
    }
}

impl<T> IndexMut<Var> for VarVec<T> {
    fn index_mut(&mut self, index: Var) -> &mut Self::Output {
        &mut self.0[index.as_index()]
    }
}

/// Wrapper around a `Vec` that is indexed by [`Lit`].
#[derive(Debug, Clone)]
pub(crate) struct LitVec<T>(Vec<T>);

impl<T: Default> LitVec<T> {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.0.resize_with(count * 2, Default::default);
    }
}

impl<T> Default for LitVec<T> {
    fn default() -> Self {
        Self(Vec::default())
    }
}

impl<T> Index<Lit> for LitVec<T> {
    type Output = T;

    fn index(&self, index: Lit) -> &Self::Output {
        &self.0[index.as_index()]
    }
}

impl<T> IndexMut<Lit> for LitVec<T> {
    fn index_mut(&mut self, index: Lit) -> &mut Self::Output {
        &mut self.0[index.as_index()]
    }
}
