mod collection;
mod helpers;
mod processors;
