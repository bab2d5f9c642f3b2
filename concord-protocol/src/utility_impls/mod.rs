mod actor_id;
mod element_id;
mod key;
mod object_id;
mod primitive_value;
