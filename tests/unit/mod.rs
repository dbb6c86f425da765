mod extraction;
mod normalization;
