// Copyright @yucwang 2021

pub mod direct_lighting;
