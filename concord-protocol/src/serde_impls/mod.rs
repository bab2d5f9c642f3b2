mod conflict;
mod diff;
mod element_id;
mod object_id;
